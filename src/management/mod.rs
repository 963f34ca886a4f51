mod auth;
mod cache;
mod notify;
mod store;

pub use auth::{Claims, Passwords, TokenManager, TokenPair};
pub use cache::{DAY, HOUR, MINUTE, TtlCache};
pub use notify::NotificationHub;
pub use store::{
    DEFAULT_PLAYLIST_TITLE, LikeOutcome, MAX_TITLE_LENGTH, PublicFavorites, Store, StoreError,
    same_track,
};
