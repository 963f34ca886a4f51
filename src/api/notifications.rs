use std::collections::HashMap;

use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    api::extract::{AuthUser, bearer_token, not_authenticated, user_for_token},
    errors::{ApiError, ApiResult},
    server::AppState,
    utils::parse_limit,
};

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// `GET /ws/notifications/`
///
/// The access token comes from `?token=` or a bearer `Authorization`
/// header. Unauthenticated requests get a 401 instead of an upgrade.
pub async fn notifications_socket(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = params
        .get("token")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers));

    let Some(token) = token else {
        return not_authenticated().into_response();
    };
    let user = match user_for_token(&token, &state).await {
        Ok(user) => user,
        Err(rejection) => return rejection.into_response(),
    };

    match ws {
        Ok(ws) => {
            let user_id = user.id;
            ws.on_upgrade(move |socket| relay(socket, state, user_id))
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// Forwards the user's notifications until either side goes away.
/// Client messages are read and dropped.
async fn relay(mut socket: WebSocket, state: AppState, user_id: u64) {
    let mut events = state.hub.subscribe(user_id);
    tracing::info!(user_id, "notification socket connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            event = events.recv() => match event {
                Ok(payload) => {
                    let text = match serde_json::to_string(&payload) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "cannot encode notification");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id, skipped, "notification socket lagging");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    drop(events);
    state.hub.release(user_id);
    tracing::info!(user_id, "notification socket closed");
}

/// `GET /api/notifications/`
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let limit = parse_limit(params.get("limit").map(String::as_str), DEFAULT_LIMIT)
        .map(|limit| limit.min(MAX_LIMIT))
        .ok_or_else(|| {
            ApiError::detail(StatusCode::BAD_REQUEST, format!("Limit must be 1-{MAX_LIMIT}."))
        })?;

    let items = state.store.notifications_for(user.id, limit).await;
    Ok(Json(json!({
        "results": items,
        "meta": { "count": items.len() },
    })))
}
