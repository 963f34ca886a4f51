use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    catalog::{DEFAULT_ARTIST_COUNT, LASTFM_BATCH_LIMIT},
    errors::{ApiError, ApiResult},
    server::AppState,
    utils::parse_limit,
};

/// `GET /music_api/trending/`
pub async fn trending_artists(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let limit = parse_limit(params.get("limit").map(String::as_str), DEFAULT_ARTIST_COUNT)
        .map(|limit| limit.min(LASTFM_BATCH_LIMIT))
        .ok_or_else(|| {
            ApiError::error(
                StatusCode::BAD_REQUEST,
                format!("Limit must be 1-{LASTFM_BATCH_LIMIT}"),
            )
        })?;
    let genre = params
        .get("genre")
        .map(|g| g.trim())
        .filter(|g| !g.is_empty());

    let (artists, cached) = state.catalog.trending_artists(genre, limit).await;
    Ok(Json(json!({
        "meta": {
            "genre": genre.unwrap_or("all"),
            "count": artists.len(),
            "limit": limit,
            "cached": cached,
        },
        "artists": artists,
    })))
}
