use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    types::{
        LikeNotification, NewUser, NotificationPayload, Playlist, PlaylistLike, StoredTrack,
        TrendingPlaylist, User,
    },
    utils::normalize,
};

pub const DEFAULT_PLAYLIST_TITLE: &str = "Favorites";
pub const MAX_TITLE_LENGTH: usize = 255;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a user with that username already exists")]
    UsernameTaken,
    #[error("a user with that email already exists")]
    EmailTaken,
    #[error("record not found")]
    NotFound,
    #[error("users cannot like their own playlist")]
    SelfLike,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Counters {
    user: u64,
    playlist: u64,
    like: u64,
    notification: u64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    ids: Counters,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    playlists: Vec<Playlist>,
    #[serde(default)]
    likes: Vec<PlaylistLike>,
    #[serde(default)]
    notifications: Vec<LikeNotification>,
}

impl Database {
    fn favorites_index(&self, user_id: u64) -> Option<usize> {
        self.playlists
            .iter()
            .enumerate()
            .filter(|(_, p)| p.user_id == user_id)
            .min_by_key(|(_, p)| (p.created_at, p.id))
            .map(|(index, _)| index)
    }

    /// Index of the user's favorites playlist, creating it when missing.
    fn favorites_or_create(&mut self, user_id: u64) -> usize {
        if let Some(index) = self.favorites_index(user_id) {
            return index;
        }
        self.ids.playlist += 1;
        self.playlists.push(Playlist {
            id: self.ids.playlist,
            user_id,
            title: DEFAULT_PLAYLIST_TITLE.to_string(),
            tracks: Vec::new(),
            created_at: Utc::now(),
        });
        self.playlists.len() - 1
    }

    fn public_owner(&self, username: &str) -> Option<&User> {
        let wanted = username.to_lowercase();
        self.users
            .iter()
            .find(|u| u.username.to_lowercase() == wanted)
            .filter(|u| u.is_public_favorites)
    }

    fn like_stats(&self, playlist_id: u64, viewer: Option<u64>) -> (usize, bool) {
        let likes = self.likes.iter().filter(|l| l.playlist_id == playlist_id);
        let mut count = 0;
        let mut liked_by_viewer = false;
        for like in likes {
            count += 1;
            if Some(like.user_id) == viewer {
                liked_by_viewer = true;
            }
        }
        (count, liked_by_viewer)
    }
}

/// Result of adding or removing a like.
#[derive(Debug, Clone)]
pub struct LikeOutcome {
    pub playlist_title: String,
    pub likes_count: usize,
    pub liked_by_me: bool,
    /// Recipient id and payload when a new like should be pushed to the owner.
    pub notification: Option<(u64, NotificationPayload)>,
}

/// A user's public favorites as seen by somebody else.
#[derive(Debug, Clone)]
pub struct PublicFavorites {
    pub owner: User,
    pub playlist: Playlist,
    pub likes_count: usize,
    pub liked_by_me: bool,
}

/// Users, playlists, likes and notifications kept in one JSON document.
///
/// Every mutation rewrites the document while the write lock is held, so
/// writers are serialized and the file always reflects a complete state.
/// Mutations are applied to a copy that replaces the live state only once it
/// has been written.
pub struct Store {
    path: Option<PathBuf>,
    db: RwLock<Database>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            db: RwLock::new(Database::default()),
        }
    }

    /// Opens the database at `path`, starting empty when the file does not
    /// exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let db = if path.is_file() {
            let json = async_fs::read_to_string(&path).await?;
            serde_json::from_str(&json)?
        } else {
            Database::default()
        };

        Ok(Self {
            path: Some(path),
            db: RwLock::new(db),
        })
    }

    async fn persist(&self, db: &Database) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(db)?;
        let tmp = path.with_extension("json.tmp");
        async_fs::write(&tmp, json).await?;
        async_fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Runs `change` on a copy of the database. The closure returns its result
    /// and whether it modified anything; a modified copy is persisted and only
    /// then swapped in.
    async fn commit<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Database) -> Result<(T, bool), StoreError>,
    {
        let mut db = self.db.write().await;
        let mut next = db.clone();
        let (value, changed) = change(&mut next)?;
        if changed {
            self.persist(&next).await?;
            *db = next;
        }
        Ok(value)
    }

    // -- users ---------------------------------------------------------------

    /// Creates a user and their favorites playlist. Username and email are
    /// unique case-insensitively.
    pub async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        self.commit(|db| {
            let username = new.username.to_lowercase();
            let email = new.email.to_lowercase();

            if db.users.iter().any(|u| u.username.to_lowercase() == username) {
                return Err(StoreError::UsernameTaken);
            }
            if db.users.iter().any(|u| u.email.to_lowercase() == email) {
                return Err(StoreError::EmailTaken);
            }

            db.ids.user += 1;
            let user = User {
                id: db.ids.user,
                username: new.username,
                email: new.email,
                password_hash: new.password_hash,
                first_name: String::new(),
                last_name: String::new(),
                avatar: None,
                banner: None,
                bio: String::new(),
                gender: Default::default(),
                country: String::new(),
                birth_date: None,
                is_public_favorites: true,
                date_joined: Utc::now(),
            };
            db.users.push(user.clone());
            db.favorites_or_create(user.id);
            Ok((user, true))
        })
        .await
    }

    pub async fn user(&self, id: u64) -> Option<User> {
        let db = self.db.read().await;
        db.users.iter().find(|u| u.id == id).cloned()
    }

    /// Exact username match, as used for logging in.
    pub async fn user_by_username(&self, username: &str) -> Option<User> {
        let db = self.db.read().await;
        db.users.iter().find(|u| u.username == username).cloned()
    }

    pub async fn list_users(&self) -> Vec<User> {
        let db = self.db.read().await;
        let mut users = db.users.clone();
        users.sort_by_key(|u| u.id);
        users
    }

    /// Applies `change` to the user and persists the result.
    pub async fn update_user<F>(&self, id: u64, change: F) -> Result<User, StoreError>
    where
        F: FnOnce(&mut User),
    {
        self.commit(|db| {
            let user = db
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(StoreError::NotFound)?;
            change(user);
            Ok((user.clone(), true))
        })
        .await
    }

    /// Removes a user together with their playlists, likes and notifications.
    pub async fn delete_user(&self, username: &str) -> Result<User, StoreError> {
        self.commit(|db| {
            let index = db
                .users
                .iter()
                .position(|u| u.username == username)
                .ok_or(StoreError::NotFound)?;
            let user = db.users.remove(index);

            let owned: Vec<u64> = db
                .playlists
                .iter()
                .filter(|p| p.user_id == user.id)
                .map(|p| p.id)
                .collect();
            db.playlists.retain(|p| p.user_id != user.id);
            db.likes
                .retain(|l| l.user_id != user.id && !owned.contains(&l.playlist_id));
            db.notifications.retain(|n| {
                n.recipient_id != user.id && n.actor_id != user.id && !owned.contains(&n.playlist_id)
            });
            Ok((user, true))
        })
        .await
    }

    // -- favorites -----------------------------------------------------------

    /// The user's favorites playlist, created on first access.
    pub async fn favorites(&self, user_id: u64) -> Result<Playlist, StoreError> {
        {
            let db = self.db.read().await;
            if let Some(index) = db.favorites_index(user_id) {
                return Ok(db.playlists[index].clone());
            }
        }

        self.commit(|db| {
            let index = db.favorites_or_create(user_id);
            Ok((db.playlists[index].clone(), true))
        })
        .await
    }

    pub async fn rename_favorites(&self, user_id: u64, title: &str) -> Result<Playlist, StoreError> {
        self.commit(|db| {
            let index = db.favorites_or_create(user_id);
            db.playlists[index].title = title.to_string();
            Ok((db.playlists[index].clone(), true))
        })
        .await
    }

    /// Appends `track` unless an equal one is already present. Returns
    /// whether it was added.
    pub async fn add_favorite_track(
        &self,
        user_id: u64,
        track: StoredTrack,
    ) -> Result<(bool, Playlist), StoreError> {
        self.commit(|db| {
            let existed = db.favorites_index(user_id).is_some();
            let index = db.favorites_or_create(user_id);

            if db.playlists[index]
                .tracks
                .iter()
                .any(|existing| same_track(existing, &track))
            {
                return Ok(((false, db.playlists[index].clone()), !existed));
            }

            db.playlists[index].tracks.push(track);
            Ok(((true, db.playlists[index].clone()), true))
        })
        .await
    }

    /// Removes every entry equal to `track`. Returns how many were removed.
    pub async fn remove_favorite_track(
        &self,
        user_id: u64,
        track: &StoredTrack,
    ) -> Result<(usize, Playlist), StoreError> {
        self.commit(|db| {
            let existed = db.favorites_index(user_id).is_some();
            let index = db.favorites_or_create(user_id);

            let before = db.playlists[index].tracks.len();
            db.playlists[index]
                .tracks
                .retain(|existing| !same_track(existing, track));
            let removed = before - db.playlists[index].tracks.len();
            let playlist = db.playlists[index].clone();
            Ok(((removed, playlist), removed > 0 || !existed))
        })
        .await
    }

    // -- public playlists and likes -----------------------------------------

    /// Looks up the favorites of a user who made them public. The username
    /// match is case-insensitive.
    pub async fn public_favorites(
        &self,
        username: &str,
        viewer: Option<u64>,
    ) -> Result<PublicFavorites, StoreError> {
        {
            let db = self.db.read().await;
            let owner = db.public_owner(username).ok_or(StoreError::NotFound)?;
            if let Some(index) = db.favorites_index(owner.id) {
                let playlist = db.playlists[index].clone();
                let (likes_count, liked_by_me) = db.like_stats(playlist.id, viewer);
                return Ok(PublicFavorites {
                    owner: owner.clone(),
                    playlist,
                    likes_count,
                    liked_by_me,
                });
            }
        }

        self.commit(|db| {
            let owner = db.public_owner(username).cloned().ok_or(StoreError::NotFound)?;
            let existed = db.favorites_index(owner.id).is_some();
            let index = db.favorites_or_create(owner.id);
            let playlist = db.playlists[index].clone();
            let (likes_count, liked_by_me) = db.like_stats(playlist.id, viewer);
            let view = PublicFavorites {
                owner,
                playlist,
                likes_count,
                liked_by_me,
            };
            Ok((view, !existed))
        })
        .await
    }

    /// Likes or unlikes `username`'s public favorites on behalf of `actor`.
    ///
    /// Liking twice is a no-op. Only a newly created like produces a
    /// notification.
    pub async fn set_like(
        &self,
        username: &str,
        actor: &User,
        should_like: bool,
    ) -> Result<LikeOutcome, StoreError> {
        self.commit(|db| {
            let owner_id = db.public_owner(username).map(|u| u.id).ok_or(StoreError::NotFound)?;
            let existed_before = db.favorites_index(owner_id).is_some();
            let index = db.favorites_or_create(owner_id);
            let playlist_id = db.playlists[index].id;
            let playlist_title = db.playlists[index].title.clone();

            if owner_id == actor.id {
                return Err(StoreError::SelfLike);
            }

            let existing = db
                .likes
                .iter()
                .position(|l| l.playlist_id == playlist_id && l.user_id == actor.id);

            let mut notification = None;
            let mut changed = !existed_before;
            match (should_like, existing) {
                (true, None) => {
                    let now = Utc::now();
                    db.ids.like += 1;
                    let like_id = db.ids.like;
                    db.likes.push(PlaylistLike {
                        id: like_id,
                        playlist_id,
                        user_id: actor.id,
                        created_at: now,
                    });

                    db.ids.notification += 1;
                    let notification_id = db.ids.notification;
                    db.notifications.push(LikeNotification {
                        id: notification_id,
                        recipient_id: owner_id,
                        actor_id: actor.id,
                        playlist_id,
                        created_at: now,
                    });
                    notification = Some((
                        owner_id,
                        NotificationPayload::playlist_like(&actor.username, &playlist_title, now),
                    ));
                    changed = true;
                }
                (false, Some(position)) => {
                    db.likes.remove(position);
                    changed = true;
                }
                _ => {}
            }

            let (likes_count, liked_by_me) = db.like_stats(playlist_id, Some(actor.id));
            let outcome = LikeOutcome {
                playlist_title,
                likes_count,
                liked_by_me,
                notification,
            };
            Ok((outcome, changed))
        })
        .await
    }

    /// Playlists of users with public favorites, most liked first and newest
    /// first among equals.
    pub async fn trending_public(&self, limit: usize) -> Vec<TrendingPlaylist> {
        let db = self.db.read().await;
        let mut rows: Vec<(&Playlist, &User, usize)> = db
            .playlists
            .iter()
            .filter_map(|playlist| {
                let owner = db
                    .users
                    .iter()
                    .find(|u| u.id == playlist.user_id && u.is_public_favorites)?;
                let (likes, _) = db.like_stats(playlist.id, None);
                Some((playlist, owner, likes))
            })
            .collect();

        rows.sort_by(|a, b| {
            b.2.cmp(&a.2)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
                .then_with(|| b.0.id.cmp(&a.0.id))
        });

        rows.into_iter()
            .take(limit)
            .map(|(playlist, owner, likes)| TrendingPlaylist {
                username: owner.username.clone(),
                avatar_url: owner.avatar_url(),
                playlist_title: playlist.title.clone(),
                likes_count: likes,
                tracks_count: playlist.tracks.len(),
            })
            .collect()
    }

    /// Stored like notifications for `user_id`, newest first.
    pub async fn notifications_for(&self, user_id: u64, limit: usize) -> Vec<NotificationPayload> {
        let db = self.db.read().await;
        let mut items: Vec<&LikeNotification> = db
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        items
            .into_iter()
            .take(limit)
            .map(|n| {
                let actor = db
                    .users
                    .iter()
                    .find(|u| u.id == n.actor_id)
                    .map(|u| u.username.as_str())
                    .unwrap_or_default();
                let title = db
                    .playlists
                    .iter()
                    .find(|p| p.id == n.playlist_id)
                    .map(|p| p.title.as_str())
                    .unwrap_or(DEFAULT_PLAYLIST_TITLE);
                NotificationPayload::playlist_like(actor, title, n.created_at)
            })
            .collect()
    }
}

/// Same non-empty mbid, or same name and artist ignoring case and
/// surrounding whitespace.
pub fn same_track(a: &StoredTrack, b: &StoredTrack) -> bool {
    let mbid_a = a.mbid.as_deref().map(str::trim).unwrap_or_default();
    let mbid_b = b.mbid.as_deref().map(str::trim).unwrap_or_default();
    if !mbid_a.is_empty() && mbid_a == mbid_b {
        return true;
    }
    normalize(&a.name) == normalize(&b.name) && normalize(&a.artist) == normalize(&b.artist)
}
