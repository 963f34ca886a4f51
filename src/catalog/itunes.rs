use std::{collections::HashMap, time::Duration};

use futures::future::join_all;

use super::{Catalog, ITUNES_BATCH_LIMIT};
use crate::{
    errors::AppError,
    management::{DAY, HOUR, MINUTE},
    types::{ItunesSearchResponse, MediaLinks, TrackKey, TrackSeed},
};

/// iTunes throttles bursts aggressively; every request waits this long
/// while holding its permit.
const REQUEST_SPACING: Duration = Duration::from_millis(100);

impl Catalog {
    /// Cover art and previews from the iTunes Search API for at most
    /// [`ITUNES_BATCH_LIMIT`] tracks.
    pub async fn itunes_batch(&self, seeds: &[TrackSeed]) -> HashMap<TrackKey, MediaLinks> {
        let keys = unique_keys(seeds, ITUNES_BATCH_LIMIT);
        let tasks = keys.into_iter().map(|(name, artist)| async move {
            let links = self.itunes_track(&name, &artist).await;
            ((name, artist), links)
        });
        join_all(tasks).await.into_iter().collect()
    }

    async fn itunes_track(&self, name: &str, artist: &str) -> MediaLinks {
        let key = format!("itunes:{}:{}", artist.to_lowercase(), name.to_lowercase());
        if let Some(cached) = self.cache.get::<MediaLinks>(&key) {
            return cached;
        }

        let (links, ttl) = match self.itunes_lookup(name, artist).await {
            Ok(Some(links)) => (links, 7 * DAY),
            Ok(None) => (MediaLinks::default(), HOUR),
            Err(e) => {
                tracing::warn!(track = name, artist, error = %e, "itunes lookup failed");
                (MediaLinks::default(), 30 * MINUTE)
            }
        };

        if let Err(e) = self.cache.set(&key, &links, ttl) {
            tracing::warn!(%key, error = %e, "cannot cache itunes result");
        }
        links
    }

    async fn itunes_lookup(&self, name: &str, artist: &str) -> Result<Option<MediaLinks>, AppError> {
        let _permit = self
            .itunes_permits
            .acquire()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        tokio::time::sleep(REQUEST_SPACING).await;

        let response: ItunesSearchResponse = self
            .get_json(
                &self.urls.itunes,
                &[
                    ("term", name.to_string()),
                    ("media", "music".to_string()),
                    ("entity", "song".to_string()),
                    ("attribute", "songTerm".to_string()),
                    ("limit", "5".to_string()),
                ],
            )
            .await?;

        let wanted_name = name.to_lowercase();
        let wanted_artist = artist.to_lowercase();
        Ok(response
            .results
            .into_iter()
            .find(|item| {
                item.track_name.to_lowercase() == wanted_name
                    && item.artist_name.to_lowercase() == wanted_artist
            })
            .map(|item| MediaLinks {
                cover: item
                    .artwork_url100
                    .filter(|url| !url.is_empty())
                    .map(|url| url.replace("100x100bb", "600x600bb")),
                preview: item.preview_url.filter(|url| !url.is_empty()),
            }))
    }
}

/// The first `limit` seeds' keys, without repeats.
pub(super) fn unique_keys(seeds: &[TrackSeed], limit: usize) -> Vec<TrackKey> {
    let mut keys: Vec<TrackKey> = Vec::new();
    for seed in seeds.iter().take(limit) {
        let key = seed.key();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

