//! # CLI Module
//!
//! Terminal front-end of tunescout. Every command loads [`Settings`] from
//! the environment, runs the same catalog pipeline or store operations the
//! HTTP API uses, and prints the result as a table.
//!
//! ## Commands
//!
//! - [`serve`] - Runs the HTTP and WebSocket API server
//! - [`chart`] - Year chart tracks, optionally for one genre
//! - [`search`] - Track search with iTunes/Deezer enrichment
//! - [`trending_artists`] - Trending artists with photos and top releases
//! - [`wiki`] - Wikipedia summaries for a list of artists
//! - [`list_users`] / [`delete_user`] - Inspect and prune accounts
//!
//! ## Error Handling
//!
//! Fatal problems (missing `LASTFM_KEY`, unreadable database) end the
//! process through [`crate::error!`]. Empty results are reported with
//! [`crate::warning!`] and exit normally.
//!
//! ## Usage
//!
//! ```bash
//! tunescout chart --genre rock --limit 10
//! tunescout search "karma police"
//! tunescout artists --genre jazz
//! tunescout wiki Radiohead Björk --lang en
//! tunescout users list
//! tunescout serve --open
//! ```

mod artists;
mod serve;
mod tracks;
mod users;

pub use artists::trending_artists;
pub use artists::wiki;
pub use serve::serve;
pub use tracks::chart;
pub use tracks::search;
pub use users::delete_user;
pub use users::list_users;

use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    catalog::Catalog,
    config::Settings,
    error,
    management::{Store, TtlCache},
};

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}

fn catalog(settings: &Settings) -> Catalog {
    match Catalog::new(settings, Arc::new(TtlCache::new())) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Cannot create HTTP client. Err: {}", e);
        }
    }
}

async fn open_store(settings: &Settings) -> Store {
    let opened = match &settings.database_path {
        Some(path) => Store::open(path).await,
        None => Ok(Store::in_memory()),
    };

    match opened {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot open database. Err: {}", e);
        }
    }
}

/// Shortens `text` to `max` characters, appending an ellipsis when cut.
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}
