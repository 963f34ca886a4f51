use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    api::extract::{AuthUser, MaybeUser},
    errors::{ApiError, ApiResult},
    management::{MAX_TITLE_LENGTH, StoreError},
    server::AppState,
    types::{StoredTrack, TrackSeed, User},
    utils::{parse_limit, str_field},
};

const DEFAULT_TRENDING_LIMIT: usize = 8;
const MAX_TRENDING_LIMIT: usize = 30;

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Value {
    body.map(|Json(body)| body).unwrap_or(Value::Null)
}

fn track_payload(body: &Value) -> ApiResult<StoredTrack> {
    let name = str_field(body, "name");
    let artist = str_field(body, "artist");
    if name.is_empty() || artist.is_empty() {
        return Err(ApiError::detail(
            StatusCode::BAD_REQUEST,
            "Both name and artist are required.",
        ));
    }
    let mbid = str_field(body, "mbid");
    Ok(StoredTrack {
        name,
        artist,
        mbid: (!mbid.is_empty()).then_some(mbid),
    })
}

fn not_found() -> ApiError {
    ApiError::detail(StatusCode::NOT_FOUND, "Public playlist not found.")
}

/// `GET /api/playlists/me/`
pub async fn my_playlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let playlist = state
        .store
        .favorites(user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load playlist."))?;

    let seeds: Vec<TrackSeed> = playlist.tracks.iter().map(TrackSeed::from).collect();
    let tracks = state.catalog.enrich_tracks(&seeds).await;
    Ok(Json(json!({ "title": playlist.title, "tracks": tracks })))
}

/// `PATCH /api/playlists/me/`
pub async fn rename_playlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let title = str_field(&json_body(body), "title");
    if title.is_empty() {
        return Err(ApiError::detail(StatusCode::BAD_REQUEST, "Title is required."));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::detail(StatusCode::BAD_REQUEST, "Title is too long."));
    }

    let playlist = state
        .store
        .rename_favorites(user.id, &title)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update playlist title."))?;

    Ok(Json(json!({ "detail": "Title updated.", "title": playlist.title })))
}

/// `POST /api/playlists/me/tracks/`
pub async fn add_track(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let track = track_payload(&json_body(body))?;

    let (added, playlist) = state
        .store
        .add_favorite_track(user.id, track.clone())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to add track."))?;

    let (status, detail) = if added {
        (StatusCode::CREATED, "Track added.")
    } else {
        (StatusCode::CONFLICT, "Track already exists.")
    };
    Ok((
        status,
        Json(json!({ "detail": detail, "track": track, "title": playlist.title })),
    ))
}

/// `DELETE /api/playlists/me/tracks/`
pub async fn remove_track(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let track = track_payload(&json_body(body))?;

    let (removed, playlist) = state
        .store
        .remove_favorite_track(user.id, &track)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to remove track."))?;

    let (status, detail) = if removed > 0 {
        (StatusCode::OK, "Track removed.")
    } else {
        (StatusCode::NOT_FOUND, "Track not found.")
    };
    Ok((
        status,
        Json(json!({ "detail": detail, "track": track, "title": playlist.title })),
    ))
}

/// `GET /api/playlists/public/trending/`
pub async fn trending_playlists(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let limit = parse_limit(params.get("limit").map(String::as_str), DEFAULT_TRENDING_LIMIT)
        .filter(|limit| *limit <= MAX_TRENDING_LIMIT)
        .ok_or_else(|| {
            ApiError::detail(
                StatusCode::BAD_REQUEST,
                format!("Limit must be 1-{MAX_TRENDING_LIMIT}."),
            )
        })?;

    let rows = state.store.trending_public(limit).await;
    Ok(Json(json!({
        "results": rows,
        "meta": { "count": rows.len(), "limit": limit },
    })))
}

/// `GET /api/playlists/public/{username}/`
pub async fn public_playlist(
    State(state): State<AppState>,
    Path(username): Path<String>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<Json<Value>> {
    let favorites = match state
        .store
        .public_favorites(&username, viewer.map(|v| v.id))
        .await
    {
        Ok(favorites) => favorites,
        Err(StoreError::NotFound) => return Err(not_found()),
        Err(e) => return Err(ApiError::internal(e, "Failed to load public favorites.")),
    };

    let seeds: Vec<TrackSeed> = favorites.playlist.tracks.iter().map(TrackSeed::from).collect();
    let tracks = state.catalog.enrich_tracks(&seeds).await;

    Ok(Json(json!({
        "owner": {
            "username": favorites.owner.username,
            "avatar_url": favorites.owner.avatar_url(),
            "bio": favorites.owner.bio,
        },
        "playlist": {
            "title": favorites.playlist.title,
            "likes_count": favorites.likes_count,
            "liked_by_me": favorites.liked_by_me,
            "tracks": tracks,
        },
    })))
}

/// `POST /api/playlists/public/{username}/like/`
pub async fn like_playlist(
    State(state): State<AppState>,
    Path(username): Path<String>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    toggle_like(state, &username, user, true).await
}

/// `DELETE /api/playlists/public/{username}/like/`
pub async fn unlike_playlist(
    State(state): State<AppState>,
    Path(username): Path<String>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    toggle_like(state, &username, user, false).await
}

async fn toggle_like(
    state: AppState,
    username: &str,
    actor: User,
    should_like: bool,
) -> ApiResult<Json<Value>> {
    let outcome = match state.store.set_like(username, &actor, should_like).await {
        Ok(outcome) => outcome,
        Err(StoreError::NotFound) => return Err(not_found()),
        Err(StoreError::SelfLike) => {
            return Err(ApiError::detail(
                StatusCode::BAD_REQUEST,
                "You cannot like your own public playlist.",
            ));
        }
        Err(e) => return Err(ApiError::internal(e, "Failed to toggle like.")),
    };

    if let Some((recipient, payload)) = outcome.notification {
        let delivered = state.hub.publish(recipient, payload);
        tracing::debug!(recipient, delivered, "like notification published");
    }

    let detail = if should_like { "Liked." } else { "Unliked." };
    Ok(Json(json!({
        "detail": detail,
        "likes_count": outcome.likes_count,
        "liked_by_me": outcome.liked_by_me,
        "title": outcome.playlist_title,
    })))
}
