//! # API Module
//!
//! HTTP and WebSocket handlers served by `tunescout serve`.
//!
//! ## Endpoints
//!
//! - Music: [`year_chart`], [`search_tracks`], [`trending_artists`] and
//!   [`wikipedia_artists`] are public and backed by the catalog.
//! - Accounts: [`signup`], [`obtain_token`], [`refresh_token`], [`me`],
//!   [`update_me`] and [`upload_media`].
//! - Playlists: the caller's favorites ([`my_playlist`], [`rename_playlist`],
//!   [`add_track`], [`remove_track`]) and other users' public favorites
//!   ([`public_playlist`], [`like_playlist`], [`unlike_playlist`],
//!   [`trending_playlists`]).
//! - Notifications: [`notifications_socket`] pushes likes live and
//!   [`list_notifications`] returns the stored ones.
//! - Monitoring: [`health`].
//!
//! Authentication uses bearer access tokens, resolved by the extractors in
//! [`extract`]. Error bodies follow one of two shapes, `{"detail": ...}` or
//! `{"error": ...}`, depending on the endpoint.

mod artists;
mod auth;
pub mod extract;
mod health;
mod notifications;
mod playlists;
mod tracks;
mod users;
mod wikipedia;

pub use artists::trending_artists;
pub use auth::{obtain_token, refresh_token, signup};
pub use health::health;
pub use notifications::{list_notifications, notifications_socket};
pub use playlists::{
    add_track, like_playlist, my_playlist, public_playlist, remove_track, rename_playlist,
    trending_playlists, unlike_playlist,
};
pub use tracks::{search_tracks, year_chart};
pub use users::{me, update_me, upload_media, user_json};
pub use wikipedia::wikipedia_artists;
