use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
};
use serde_json::json;

use crate::{errors::ApiError, server::AppState, types::User};

/// The authenticated user; requests without credentials are rejected.
pub struct AuthUser(pub User);

/// The authenticated user when credentials are present. Present but invalid
/// credentials are still rejected.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await? {
            Some(user) => Ok(AuthUser(user)),
            None => Err(not_authenticated()),
        }
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(authenticate(parts, state).await?))
    }
}

pub fn not_authenticated() -> ApiError {
    ApiError::detail(
        StatusCode::UNAUTHORIZED,
        "Authentication credentials were not provided.",
    )
}

pub fn invalid_token() -> ApiError {
    ApiError::with_body(
        StatusCode::UNAUTHORIZED,
        json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid",
        }),
    )
}

/// The bearer token of the request, if any. Other schemes are ignored.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut pieces = header.split_whitespace();
    match (pieces.next(), pieces.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
            Some(token.to_string())
        }
        _ => None,
    }
}

/// Resolves an access token to its user.
pub async fn user_for_token(token: &str, state: &AppState) -> Result<User, ApiError> {
    let user_id = state.tokens.verify_access(token).map_err(|e| {
        tracing::debug!(error = %e, "rejected access token");
        invalid_token()
    })?;

    state.store.user(user_id).await.ok_or_else(|| {
        ApiError::with_body(
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "User not found", "code": "user_not_found" }),
        )
    })
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<User>, ApiError> {
    match bearer_token(&parts.headers) {
        Some(token) => user_for_token(&token, state).await.map(Some),
        None => Ok(None),
    }
}
