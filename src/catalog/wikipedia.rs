use std::collections::HashMap;

use futures::future::join_all;
use reqwest::{StatusCode, Url};

use super::{Catalog, WIKIPEDIA_BATCH_LIMIT};
use crate::{
    errors::AppError,
    management::{DAY, HOUR},
    types::{WikiSummary, WikipediaBio},
};

const FALLBACK_LANG: &str = "en";

impl Catalog {
    /// Biographies for up to [`WIKIPEDIA_BATCH_LIMIT`] artists.
    ///
    /// Artists without an article in `lang` are looked up in English.
    /// Artists found in neither are left out of the map.
    pub async fn wikipedia_bios(&self, names: &[String], lang: &str) -> HashMap<String, WikipediaBio> {
        let mut unique: Vec<&String> = Vec::new();
        for name in names.iter().take(WIKIPEDIA_BATCH_LIMIT) {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        let tasks = unique.into_iter().map(|name| async move {
            let bio = self.wikipedia_bio(name, lang).await;
            (name.clone(), bio)
        });
        join_all(tasks)
            .await
            .into_iter()
            .filter_map(|(name, bio)| bio.map(|bio| (name, bio)))
            .collect()
    }

    async fn wikipedia_bio(&self, name: &str, lang: &str) -> Option<WikipediaBio> {
        let key = format!("wikipedia:{lang}:{}", name.to_lowercase());
        if let Some(cached) = self.cache.get::<Option<WikipediaBio>>(&key) {
            return cached;
        }

        let mut bio = self.wikipedia_lookup(name, lang).await;
        if bio.is_none() && lang != FALLBACK_LANG {
            bio = self.wikipedia_lookup(name, FALLBACK_LANG).await;
        }

        let ttl = if bio.is_some() { 7 * DAY } else { HOUR };
        if let Err(e) = self.cache.set(&key, &bio, ttl) {
            tracing::warn!(%key, error = %e, "cannot cache wikipedia bio");
        }
        bio
    }

    async fn wikipedia_lookup(&self, name: &str, lang: &str) -> Option<WikipediaBio> {
        match self.wikipedia_summary(name, lang).await {
            Ok(summary) => summary.and_then(|summary| into_bio(summary, lang)),
            Err(e) => {
                tracing::warn!(artist = name, lang, error = %e, "wikipedia lookup failed");
                None
            }
        }
    }

    async fn wikipedia_summary(&self, name: &str, lang: &str) -> Result<Option<WikiSummary>, AppError> {
        let base = self.urls.wikipedia.replace("{lang}", lang);
        let mut url = Url::parse(&base).map_err(|e| AppError::Config(e.to_string()))?;
        let title = name.replace(' ', "_");
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("invalid wikipedia url: {base}")))?
            .pop_if_empty()
            .extend(["page", "summary", title.as_str()]);

        let _permit = self
            .wikipedia_permits
            .acquire()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.error_for_status()?.bytes().await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }
}

/// Disambiguation pages and empty extracts are not biographies.
fn into_bio(summary: WikiSummary, lang: &str) -> Option<WikipediaBio> {
    if summary.kind == "disambiguation" || summary.extract.trim().is_empty() {
        return None;
    }

    let source_url = summary
        .content_urls
        .and_then(|urls| urls.desktop)
        .and_then(|desktop| desktop.page)
        .unwrap_or_else(|| {
            format!(
                "https://{lang}.wikipedia.org/wiki/{}",
                summary.title.replace(' ', "_")
            )
        });

    Some(WikipediaBio {
        bio: summary.extract,
        image_url: summary
            .originalimage
            .or(summary.thumbnail)
            .map(|image| image.source),
        title: summary.title,
        source_url,
        lang: lang.to_string(),
    })
}
