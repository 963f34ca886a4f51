use std::{collections::HashMap, time::Instant};

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Catalog, DEFAULT_IMAGE, LASTFM_BATCH_LIMIT};
use crate::{
    errors::AppError,
    management::{DAY, HOUR},
    types::{
        ArtistChartResponse, LastfmArtist, Release, TagArtistsResponse, TopAlbumsResponse,
        TrackChartResponse, TrackSearchResponse, TrackSeed,
    },
    utils::normalize,
};

impl Catalog {
    /// Calls a Last.fm API method and logs how long it took.
    ///
    /// Last.fm reports failures as `{"error": n, "message": ...}` with a 200
    /// status, so that body is turned into an error as well.
    async fn lastfm_get<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, AppError> {
        let mut query = vec![
            ("method", method.to_string()),
            ("api_key", self.lastfm_key.clone()),
            ("format", "json".to_string()),
        ];
        query.extend(params.iter().cloned());

        let _permit = self
            .lastfm_permits
            .acquire()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let started = Instant::now();
        let body: Value = self.get_json(&self.urls.lastfm, &query).await?;
        tracing::info!(
            method,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "last.fm request finished"
        );

        if let Some(code) = body.get("error") {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(AppError::Upstream(format!("last.fm error {code}: {message}")));
        }
        Ok(serde_json::from_value(body)?)
    }

    /// Global top tracks.
    pub async fn lastfm_track_chart(&self, limit: usize) -> Vec<TrackSeed> {
        match self
            .lastfm_get::<TrackChartResponse>("chart.gettoptracks", &[("limit", limit.to_string())])
            .await
        {
            Ok(response) => response.tracks.track.into_iter().map(TrackSeed::from).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "last.fm tracks chart failed");
                Vec::new()
            }
        }
    }

    pub async fn lastfm_tracks_by_genre(&self, genre: &str, limit: usize) -> Vec<TrackSeed> {
        match self
            .lastfm_get::<TrackChartResponse>(
                "tag.gettoptracks",
                &[("tag", genre.to_string()), ("limit", limit.to_string())],
            )
            .await
        {
            Ok(response) => response.tracks.track.into_iter().map(TrackSeed::from).collect(),
            Err(e) => {
                tracing::warn!(genre, error = %e, "last.fm genre tracks failed");
                Vec::new()
            }
        }
    }

    pub async fn lastfm_search_tracks(&self, query: &str, limit: usize) -> Vec<TrackSeed> {
        match self
            .lastfm_get::<TrackSearchResponse>(
                "track.search",
                &[("track", query.to_string()), ("limit", limit.to_string())],
            )
            .await
        {
            Ok(response) => response
                .results
                .and_then(|results| results.trackmatches)
                .map(|matches| matches.track.into_iter().map(TrackSeed::from).collect())
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(query, error = %e, "last.fm track search failed");
                Vec::new()
            }
        }
    }

    /// Global top artists.
    pub async fn lastfm_artist_chart(&self, limit: usize) -> Vec<LastfmArtist> {
        match self
            .lastfm_get::<ArtistChartResponse>("chart.gettopartists", &[("limit", limit.to_string())])
            .await
        {
            Ok(response) => response.artists.artist,
            Err(e) => {
                tracing::warn!(error = %e, "last.fm artists chart failed");
                Vec::new()
            }
        }
    }

    /// Top artists for a tag.
    ///
    /// Last.fm's tag ranking does not follow popularity, so twice the
    /// requested amount is fetched, sorted by listeners then playcount and
    /// cut down to `limit`.
    pub async fn lastfm_artists_by_genre(&self, genre: &str, limit: usize) -> Vec<LastfmArtist> {
        match self
            .lastfm_get::<TagArtistsResponse>(
                "tag.gettopartists",
                &[("tag", genre.to_string()), ("limit", (limit * 2).to_string())],
            )
            .await
        {
            Ok(response) => {
                let mut artists = response.topartists.artist;
                artists.sort_by(|a, b| {
                    (b.listeners, b.playcount).cmp(&(a.listeners, a.playcount))
                });
                artists.truncate(limit);
                artists
            }
            Err(e) => {
                tracing::warn!(genre, error = %e, "last.fm genre artists failed");
                Vec::new()
            }
        }
    }

    /// Top three albums for each artist, keyed by artist name.
    pub async fn lastfm_releases_batch(&self, artists: &[LastfmArtist]) -> HashMap<String, Vec<Release>> {
        let mut unique: Vec<&LastfmArtist> = Vec::new();
        for artist in artists.iter().take(LASTFM_BATCH_LIMIT) {
            if !unique.iter().any(|seen| seen.name == artist.name) {
                unique.push(artist);
            }
        }

        let tasks = unique.into_iter().map(|artist| async move {
            let releases = self.artist_releases(artist).await;
            (artist.name.clone(), releases)
        });
        join_all(tasks).await.into_iter().collect()
    }

    async fn artist_releases(&self, artist: &LastfmArtist) -> Vec<Release> {
        let mbid = artist.mbid.clone().unwrap_or_default();
        let key = if mbid.is_empty() {
            format!("lastfm_releases:{}", normalize(&artist.name))
        } else {
            format!("lastfm_releases:{mbid}")
        };
        if let Some(cached) = self.cache.get::<Vec<Release>>(&key) {
            return cached;
        }

        let result = self
            .lastfm_get::<TopAlbumsResponse>(
                "artist.gettopalbums",
                &[
                    ("artist", artist.name.clone()),
                    ("mbid", mbid),
                    ("limit", "3".to_string()),
                ],
            )
            .await;

        let (releases, ttl) = match result {
            Ok(response) => {
                let releases = response
                    .topalbums
                    .album
                    .into_iter()
                    .map(|album| Release {
                        cover: album
                            .image
                            .last()
                            .map(|image| image.text.clone())
                            .filter(|text| !text.is_empty())
                            .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
                        title: album.name,
                        playcount: album.playcount,
                        url: album.url,
                    })
                    .collect();
                (releases, 3 * DAY)
            }
            Err(e) => {
                tracing::warn!(artist = %artist.name, error = %e, "last.fm releases failed");
                (Vec::new(), HOUR)
            }
        };

        if let Err(e) = self.cache.set(&key, &releases, ttl) {
            tracing::warn!(%key, error = %e, "cannot cache releases");
        }
        releases
    }
}
