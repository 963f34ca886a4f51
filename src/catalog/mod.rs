//! Third-party music catalog clients and the enrichment pipeline.
//!
//! Last.fm supplies charts, search results and artist releases; iTunes and
//! Deezer supply cover art, previews and artist photos; Wikipedia supplies
//! artist biographies. Every upstream call is failure tolerant: errors are
//! logged and degrade to empty results. Per-item answers are cached in the
//! shared [`TtlCache`].

mod deezer;
mod enrich;
mod itunes;
mod lastfm;
mod wikipedia;

use std::{sync::Arc, time::Duration};

use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;

use crate::{
    config::{Settings, UpstreamUrls},
    errors::AppError,
    management::TtlCache,
};

pub use enrich::merge_track;

/// Fallback cover and photo served from the static directory.
pub const DEFAULT_IMAGE: &str = "/static/images/default.svg";

pub const DEFAULT_TRACK_COUNT: usize = 15;
pub const DEFAULT_ARTIST_COUNT: usize = 16;
pub const LASTFM_BATCH_LIMIT: usize = 75;
pub const ITUNES_BATCH_LIMIT: usize = 25;
pub const DEEZER_BATCH_LIMIT: usize = 40;
pub const WIKIPEDIA_BATCH_LIMIT: usize = 30;

/// How long chart, search and trending responses stay cached.
pub const RESPONSE_TTL: Duration = Duration::from_secs(600);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(7);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_IDLE_PER_HOST: usize = 5;

/// Shared client for every upstream API.
///
/// Each upstream has its own semaphore so one slow provider cannot starve
/// the others, and none of them sees more than its permit count of
/// concurrent requests from this process.
pub struct Catalog {
    client: Client,
    cache: Arc<TtlCache>,
    lastfm_key: String,
    urls: UpstreamUrls,
    lastfm_permits: Semaphore,
    itunes_permits: Semaphore,
    deezer_permits: Semaphore,
    wikipedia_permits: Semaphore,
}

impl Catalog {
    pub fn new(settings: &Settings, cache: Arc<TtlCache>) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()?;

        Ok(Self {
            client,
            cache,
            lastfm_key: settings.lastfm_key.clone(),
            urls: settings.upstream.clone(),
            lastfm_permits: Semaphore::new(5),
            itunes_permits: Semaphore::new(3),
            deezer_permits: Semaphore::new(15),
            wikipedia_permits: Semaphore::new(5),
        })
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// GET `url` and decode the JSON body, failing on non-2xx statuses.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
