use std::collections::HashMap;

use futures::future::join_all;

use super::{Catalog, DEEZER_BATCH_LIMIT, itunes::unique_keys};
use crate::{
    errors::AppError,
    management::{DAY, HOUR, MINUTE},
    types::{DeezerArtist, DeezerSearchResponse, DeezerTrack, MediaLinks, TrackKey, TrackSeed},
};

impl Catalog {
    /// Cover art and previews from Deezer for at most
    /// [`DEEZER_BATCH_LIMIT`] tracks.
    pub async fn deezer_batch(&self, seeds: &[TrackSeed]) -> HashMap<TrackKey, MediaLinks> {
        let keys = unique_keys(seeds, DEEZER_BATCH_LIMIT);
        let tasks = keys.into_iter().map(|(name, artist)| async move {
            let links = self.deezer_track(&name, &artist).await;
            ((name, artist), links)
        });
        join_all(tasks).await.into_iter().collect()
    }

    async fn deezer_track(&self, name: &str, artist: &str) -> MediaLinks {
        let key = format!("deezer:{}:{}", artist.to_lowercase(), name.to_lowercase());
        if let Some(cached) = self.cache.get::<MediaLinks>(&key) {
            return cached;
        }

        let (links, ttl) = match self.deezer_track_lookup(name, artist).await {
            Ok(Some(links)) => (links, 7 * DAY),
            Ok(None) => (MediaLinks::default(), 30 * MINUTE),
            Err(e) => {
                tracing::warn!(track = name, artist, error = %e, "deezer track lookup failed");
                (MediaLinks::default(), 30 * MINUTE)
            }
        };

        if let Err(e) = self.cache.set(&key, &links, ttl) {
            tracing::warn!(%key, error = %e, "cannot cache deezer result");
        }
        links
    }

    async fn deezer_track_lookup(&self, name: &str, artist: &str) -> Result<Option<MediaLinks>, AppError> {
        let _permit = self
            .deezer_permits
            .acquire()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let url = format!("{}/search", self.urls.deezer.trim_end_matches('/'));
        let response: DeezerSearchResponse<DeezerTrack> = self
            .get_json(
                &url,
                &[
                    ("q", format!("artist:\"{artist}\" track:\"{name}\"")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        Ok(response.data.into_iter().next().map(|item| MediaLinks {
            cover: item.album.best_cover(),
            preview: item.preview.filter(|url| !url.is_empty()),
        }))
    }

    /// Artist photos keyed by the names as given. Artists without a photo
    /// map to `None`.
    pub async fn deezer_artist_photos(&self, names: &[String]) -> HashMap<String, Option<String>> {
        let mut unique: Vec<&String> = Vec::new();
        for name in names.iter().take(DEEZER_BATCH_LIMIT) {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        let tasks = unique.into_iter().map(|name| async move {
            let photo = self.deezer_artist_photo(name).await;
            (name.clone(), photo)
        });
        join_all(tasks).await.into_iter().collect()
    }

    async fn deezer_artist_photo(&self, name: &str) -> Option<String> {
        let key = format!("deezer_artist:{}", name.to_lowercase());
        if let Some(cached) = self.cache.get::<Option<String>>(&key) {
            return cached;
        }

        let (photo, ttl) = match self.deezer_artist_lookup(name).await {
            Ok(Some(artist)) => (artist.best_picture(), 7 * DAY),
            Ok(None) => (None, HOUR),
            Err(e) => {
                tracing::warn!(artist = name, error = %e, "deezer artist lookup failed");
                (None, HOUR)
            }
        };

        if let Err(e) = self.cache.set(&key, &photo, ttl) {
            tracing::warn!(%key, error = %e, "cannot cache deezer artist photo");
        }
        photo
    }

    async fn deezer_artist_lookup(&self, name: &str) -> Result<Option<DeezerArtist>, AppError> {
        let _permit = self
            .deezer_permits
            .acquire()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let url = format!("{}/search/artist", self.urls.deezer.trim_end_matches('/'));
        let response: DeezerSearchResponse<DeezerArtist> = self
            .get_json(&url, &[("q", name.to_string()), ("limit", "1".to_string())])
            .await?;
        Ok(response.data.into_iter().next())
    }
}
