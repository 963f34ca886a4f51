use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Value, json};

use crate::server::AppState;

const PROBE_KEY: &str = "health:probe";

/// Liveness plus a cache round-trip.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let cache = state.catalog.cache();
    let healthy = cache.set(PROBE_KEY, &"ok", Duration::from_secs(5)).is_ok()
        && cache.get::<String>(PROBE_KEY).as_deref() == Some("ok");

    let (status, label) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        tracing::error!("cache round-trip failed");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
