use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    api::users::user_json,
    errors::{ApiError, ApiResult, FieldErrors},
    management::{Passwords, StoreError},
    server::AppState,
    types::NewUser,
    utils::{str_field, validate_password, validate_username},
};

const REQUIRED: &str = "This field is required.";

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Value {
    body.map(|Json(body)| body).unwrap_or(Value::Null)
}

/// Raw string field; passwords are not trimmed.
fn raw_field(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

/// Hashing and verification run on the blocking pool.
async fn hash_password(passwords: Arc<Passwords>, password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || passwords.hash(&password))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create account."))?
        .map_err(|e| ApiError::internal(e, "Failed to create account."))
}

async fn verify_password(passwords: Arc<Passwords>, password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || passwords.verify(&password, &hash))
        .await
        .unwrap_or(false)
}

/// `POST /api/auth/signup/`
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body = json_body(body);
    let username = str_field(&body, "username");
    let email = str_field(&body, "email").to_lowercase();
    let password = raw_field(&body, "password");
    let password_confirm = raw_field(&body, "password_confirm");

    let mut errors = FieldErrors::new();
    if username.is_empty() {
        push(&mut errors, "username", REQUIRED);
    } else {
        for message in validate_username(&username) {
            push(&mut errors, "username", message);
        }
    }

    if email.is_empty() {
        push(&mut errors, "email", "Email is required.");
    } else if !is_email(&email) {
        push(&mut errors, "email", "Enter a valid email address.");
    }

    if password.is_empty() {
        push(&mut errors, "password", "Password is required.");
    } else {
        for message in validate_password(&password, &username, &email) {
            push(&mut errors, "password", message);
        }
    }

    if password_confirm.is_empty() {
        push(&mut errors, "password_confirm", REQUIRED);
    } else if !password.is_empty() && password != password_confirm {
        push(&mut errors, "password_confirm", "Password confirmation does not match.");
    }

    if !errors.is_empty() {
        return Err(signup_errors(errors));
    }

    let password_hash = hash_password(state.passwords.clone(), password).await?;
    let created = state
        .store
        .create_user(NewUser {
            username,
            email,
            password_hash,
        })
        .await;

    match created {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "account created");
            Ok((StatusCode::CREATED, Json(user_json(&user))))
        }
        Err(StoreError::UsernameTaken) => {
            push(&mut errors, "username", "A user with that username already exists.");
            Err(signup_errors(errors))
        }
        Err(StoreError::EmailTaken) => {
            push(&mut errors, "email", "A user with this email already exists.");
            Err(signup_errors(errors))
        }
        Err(e) => Err(ApiError::internal(e, "Failed to create account.")),
    }
}

fn signup_errors(errors: FieldErrors) -> ApiError {
    ApiError::with_body(StatusCode::BAD_REQUEST, json!({ "errors": errors }))
}

fn is_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// `POST /api/auth/token/`
pub async fn obtain_token(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let body = json_body(body);
    let username = raw_field(&body, "username");
    let password = raw_field(&body, "password");

    let mut errors = FieldErrors::new();
    if username.is_empty() {
        push(&mut errors, "username", REQUIRED);
    }
    if password.is_empty() {
        push(&mut errors, "password", REQUIRED);
    }
    if !errors.is_empty() {
        return Err(ApiError::fields(StatusCode::BAD_REQUEST, errors));
    }

    let rejected = || {
        ApiError::detail(
            StatusCode::UNAUTHORIZED,
            "No active account found with the given credentials",
        )
    };

    let user = state.store.user_by_username(&username).await.ok_or_else(rejected)?;
    if !verify_password(state.passwords.clone(), password, user.password_hash.clone()).await {
        tracing::info!(username = %username, "login rejected");
        return Err(rejected());
    }

    let pair = state
        .tokens
        .issue_pair(user.id)
        .map_err(|e| ApiError::internal(e, "Failed to issue token."))?;
    Ok(Json(json!({ "access": pair.access, "refresh": pair.refresh })))
}

/// `POST /api/auth/token/refresh/`
pub async fn refresh_token(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let refresh = raw_field(&json_body(body), "refresh");
    if refresh.is_empty() {
        let mut errors = FieldErrors::new();
        push(&mut errors, "refresh", REQUIRED);
        return Err(ApiError::fields(StatusCode::BAD_REQUEST, errors));
    }

    let access = state.tokens.refresh(&refresh).map_err(|e| {
        tracing::debug!(error = %e, "refresh rejected");
        ApiError::with_body(
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" }),
        )
    })?;
    Ok(Json(json!({ "access": access })))
}
