use tabled::Table;

use crate::{
    config::Settings,
    error,
    management::StoreError,
    success,
    types::UserTableRow,
    warning,
};

use super::open_store;

pub async fn list_users(settings: &Settings) {
    let store = open_store(settings).await;
    let users = store.list_users().await;

    if users.is_empty() {
        warning!("No users yet.");
        return;
    }

    let rows: Vec<UserTableRow> = users
        .into_iter()
        .map(|u| UserTableRow {
            id: u.id,
            username: u.username,
            email: u.email,
            public: u.is_public_favorites,
            joined: u.date_joined.format("%Y-%m-%d").to_string(),
        })
        .collect();

    println!("{}", Table::new(rows));
}

/// Deletes the account and everything it owns, including uploaded images.
pub async fn delete_user(settings: &Settings, username: String) {
    let store = open_store(settings).await;

    let user = match store.delete_user(&username).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            warning!("No user named {}.", username);
            return;
        }
        Err(e) => {
            error!("Cannot delete {}. Err: {}", username, e);
        }
    };

    for path in [user.avatar, user.banner].into_iter().flatten() {
        if let Err(e) = async_fs::remove_file(settings.media_root.join(&path)).await {
            warning!("Cannot remove {}. Err: {}", path, e);
        }
    }

    success!("Deleted user {}.", user.username);
}
