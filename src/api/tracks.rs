use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri, header::HOST},
};
use serde_json::{Value, json};

use crate::{
    catalog::{DEFAULT_TRACK_COUNT, LASTFM_BATCH_LIMIT},
    errors::{ApiError, ApiResult},
    server::AppState,
    utils::{paginate, parse_limit, replace_page_param},
};

/// `GET /music_api/year-chart/`
pub async fn year_chart(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let limit = parse_limit(params.get("limit").map(String::as_str), DEFAULT_TRACK_COUNT)
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

    let (tracks, cached) = state.catalog.year_chart(genre, limit).await;
    Ok(Json(json!({
        "tracks": tracks,
        "meta": { "cached": cached },
    })))
}

/// `GET /music_api/search/`
///
/// Only the requested page is enriched.
pub async fn search_tracks(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    uri: Uri,
) -> ApiResult<Json<Value>> {
    let query = params.get("q").map(|q| q.trim()).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::error(StatusCode::BAD_REQUEST, "Query required"));
    }

    let seeds = state.catalog.search_tracks_raw(query).await;
    if seeds.is_empty() {
        return Ok(Json(json!({ "results": [] })));
    }

    let window = paginate(
        seeds.len(),
        params.get("page").map(String::as_str),
        params.get("page_size").map(String::as_str),
    )
    .ok_or_else(|| ApiError::detail(StatusCode::NOT_FOUND, "Invalid page."))?;

    let results = state
        .catalog
        .enrich_tracks(&seeds[window.start..window.end])
        .await;

    let url = absolute_url(&headers, &uri);
    let next = window
        .has_next()
        .then(|| replace_page_param(&url, Some(window.number + 1)));
    let previous = window.has_previous().then(|| {
        let page = window.number - 1;
        replace_page_param(&url, (page > 1).then_some(page))
    });

    Ok(Json(json!({
        "count": seeds.len(),
        "next": next,
        "previous": previous,
        "results": results,
    })))
}

fn absolute_url(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("http://{host}{path}")
}
