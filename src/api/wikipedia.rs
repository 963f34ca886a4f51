use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    catalog::WIKIPEDIA_BATCH_LIMIT,
    errors::{ApiError, ApiResult},
    server::AppState,
};

const DEFAULT_LANG: &str = "ru";
const MAX_LANG_LENGTH: usize = 5;

/// `POST /api/wikipedia/artists/`
///
/// Credentials are ignored, even invalid ones.
pub async fn wikipedia_artists(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let body = body.map(|Json(body)| body).unwrap_or(Value::Null);

    let Some(artists) = body.get("artists").and_then(Value::as_array) else {
        return Err(ApiError::error(
            StatusCode::BAD_REQUEST,
            "artists must be an array of artist names",
        ));
    };
    if artists.len() > WIKIPEDIA_BATCH_LIMIT {
        return Err(ApiError::error(
            StatusCode::BAD_REQUEST,
            format!("artists length must be <= {WIKIPEDIA_BATCH_LIMIT}"),
        ));
    }

    let lang = match body.get("lang") {
        None | Some(Value::Null) => DEFAULT_LANG.to_string(),
        Some(value) => {
            let lang = stringify(value).trim().to_lowercase();
            if lang.is_empty() { DEFAULT_LANG.to_string() } else { lang }
        }
    };
    if lang.chars().count() > MAX_LANG_LENGTH || !lang.chars().all(char::is_alphabetic) {
        return Err(ApiError::error(StatusCode::BAD_REQUEST, "lang is invalid"));
    }

    let names: Vec<String> = artists
        .iter()
        .filter(|value| !value.is_null())
        .map(|value| stringify(value).trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let bios = state.catalog.wikipedia_bios(&names, &lang).await;
    Ok(Json(json!({
        "artists": bios,
        "meta": {
            "lang_requested": lang,
            "count": bios.len(),
        },
    })))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
