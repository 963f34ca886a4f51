use axum::{
    Json,
    extract::{Multipart, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde_json::{Map, Value, json};

use crate::{
    api::extract::AuthUser,
    errors::{ApiError, ApiResult, FieldErrors},
    server::AppState,
    types::{Gender, User},
    utils::{random_token, sniff_image},
};

const MAX_NAME_LENGTH: usize = 150;
const MAX_BIO_LENGTH: usize = 500;
const MAX_COUNTRY_LENGTH: usize = 100;
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Public representation of an account.
pub fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "avatar": user.avatar_url(),
        "banner": user.banner_url(),
        "bio": user.bio,
        "gender": user.gender,
        "country": user.country,
        "birth_date": user.birth_date,
        "is_public_favorites": user.is_public_favorites,
    })
}

/// `GET /api/users/me/`
pub async fn me(AuthUser(user): AuthUser) -> Json<Value> {
    Json(user_json(&user))
}

/// A validated partial profile update.
#[derive(Debug, Default)]
struct ProfileUpdate {
    first_name: Option<String>,
    last_name: Option<String>,
    bio: Option<String>,
    gender: Option<Gender>,
    country: Option<String>,
    birth_date: Option<Option<NaiveDate>>,
    is_public_favorites: Option<bool>,
    clear_avatar: bool,
    clear_banner: bool,
}

impl ProfileUpdate {
    /// Validates the writable fields of `body`. Read-only and unknown
    /// fields are ignored.
    fn parse(body: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mut update = ProfileUpdate::default();
        let mut errors = FieldErrors::new();

        let text = |field: &str, max: usize, errors: &mut FieldErrors| -> Option<String> {
            let value = body.get(field)?;
            match value {
                Value::String(s) if s.chars().count() > max => {
                    push(errors, field, format!("Ensure this field has no more than {max} characters."));
                    None
                }
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => {
                    push(errors, field, "This field may not be null.".to_string());
                    None
                }
                _ => {
                    push(errors, field, "Not a valid string.".to_string());
                    None
                }
            }
        };

        update.first_name = text("first_name", MAX_NAME_LENGTH, &mut errors);
        update.last_name = text("last_name", MAX_NAME_LENGTH, &mut errors);
        update.bio = text("bio", MAX_BIO_LENGTH, &mut errors);
        update.country = text("country", MAX_COUNTRY_LENGTH, &mut errors);

        if let Some(value) = body.get("gender") {
            let code = value.as_str().unwrap_or_default();
            match Gender::parse(code) {
                Some(gender) if value.is_string() => update.gender = Some(gender),
                _ => push(
                    &mut errors,
                    "gender",
                    format!("\"{}\" is not a valid choice.", display(value)),
                ),
            }
        }

        if let Some(value) = body.get("birth_date") {
            match value {
                Value::Null => update.birth_date = Some(None),
                Value::String(s) if s.is_empty() => update.birth_date = Some(None),
                Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    Ok(date) => update.birth_date = Some(Some(date)),
                    Err(_) => push(&mut errors, "birth_date", wrong_date_format()),
                },
                _ => push(&mut errors, "birth_date", wrong_date_format()),
            }
        }

        if let Some(value) = body.get("is_public_favorites") {
            match parse_bool(value) {
                Some(flag) => update.is_public_favorites = Some(flag),
                None => push(&mut errors, "is_public_favorites", "Must be a valid boolean.".to_string()),
            }
        }

        for (field, clear) in [("avatar", &mut update.clear_avatar), ("banner", &mut update.clear_banner)] {
            match body.get(field) {
                None => {}
                Some(Value::Null) => *clear = true,
                Some(_) => push(
                    &mut errors,
                    field,
                    "The submitted data was not a file. Check the encoding type on the form."
                        .to_string(),
                ),
            }
        }

        if errors.is_empty() { Ok(update) } else { Err(errors) }
    }

    fn apply(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(bio) = self.bio {
            user.bio = bio;
        }
        if let Some(gender) = self.gender {
            user.gender = gender;
        }
        if let Some(country) = self.country {
            user.country = country;
        }
        if let Some(birth_date) = self.birth_date {
            user.birth_date = birth_date;
        }
        if let Some(flag) = self.is_public_favorites {
            user.is_public_favorites = flag;
        }
        if self.clear_avatar {
            user.avatar = None;
        }
        if self.clear_banner {
            user.banner = None;
        }
    }
}

fn push(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

fn wrong_date_format() -> String {
    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".to_string()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// `PATCH /api/users/me/`
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let body = match body {
        Ok(Json(Value::Object(map))) => map,
        Ok(_) => {
            return Err(ApiError::detail(
                StatusCode::BAD_REQUEST,
                "Invalid data. Expected a dictionary.",
            ));
        }
        Err(rejection) => {
            return Err(ApiError::detail(StatusCode::BAD_REQUEST, rejection.body_text()));
        }
    };

    let update = ProfileUpdate::parse(&body)
        .map_err(|errors| ApiError::fields(StatusCode::BAD_REQUEST, errors))?;

    let user = state
        .store
        .update_user(user.id, |user| update.apply(user))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update profile."))?;

    Ok(Json(user_json(&user)))
}

/// `PATCH /api/users/me/media/`
///
/// Accepts `avatar` and `banner` image parts. Files are stored under the
/// media root with random names; previous files are removed.
pub async fn upload_media(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut uploads: Vec<(&'static str, Vec<u8>)> = Vec::new();
    let mut errors = FieldErrors::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!(error = %e, "cannot read multipart field");
        ApiError::detail(StatusCode::BAD_REQUEST, "Malformed multipart body.")
    })? {
        let kind = match field.name() {
            Some("avatar") => "avatar",
            Some("banner") => "banner",
            _ => continue,
        };
        let data = field.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "cannot read upload");
            ApiError::detail(StatusCode::BAD_REQUEST, "Malformed multipart body.")
        })?;

        if data.len() > MAX_IMAGE_BYTES {
            push(&mut errors, kind, "The image must not exceed 5 MB.".to_string());
        } else if sniff_image(&data).is_none() {
            push(
                &mut errors,
                kind,
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                    .to_string(),
            );
        } else {
            uploads.push((kind, data.to_vec()));
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::fields(StatusCode::BAD_REQUEST, errors));
    }
    if uploads.is_empty() {
        return Err(ApiError::detail(StatusCode::BAD_REQUEST, "No image supplied."));
    }

    let mut saved: Vec<(&'static str, String)> = Vec::new();
    for (kind, data) in uploads {
        match save_image(&state, kind, &data).await {
            Ok(relative) => saved.push((kind, relative)),
            Err(e) => {
                let written: Vec<String> = saved.into_iter().map(|(_, path)| path).collect();
                remove_media(&state, &written).await;
                return Err(e);
            }
        }
    }

    let written: Vec<String> = saved.iter().map(|(_, path)| path.clone()).collect();
    let mut replaced: Vec<String> = Vec::new();
    let updated = state
        .store
        .update_user(user.id, |user| {
            for (kind, path) in saved {
                let slot = if kind == "avatar" { &mut user.avatar } else { &mut user.banner };
                if let Some(old) = slot.replace(path) {
                    replaced.push(old);
                }
            }
        })
        .await;

    let user = match updated {
        Ok(user) => user,
        Err(e) => {
            remove_media(&state, &written).await;
            return Err(ApiError::internal(e, "Failed to update profile."));
        }
    };
    remove_media(&state, &replaced).await;

    Ok(Json(user_json(&user)))
}

/// Best-effort removal of files under the media root.
async fn remove_media(state: &AppState, paths: &[String]) {
    for path in paths {
        if let Err(e) = async_fs::remove_file(state.settings.media_root.join(path)).await {
            tracing::debug!(%path, error = %e, "upload not removed");
        }
    }
}

async fn save_image(state: &AppState, kind: &str, data: &[u8]) -> ApiResult<String> {
    let extension = sniff_image(data).unwrap_or("bin");
    let folder = format!("{kind}s");
    let relative = format!("{folder}/{}.{extension}", random_token(24));

    let dir = state.settings.media_root.join(&folder);
    async_fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store image."))?;
    async_fs::write(state.settings.media_root.join(&relative), data)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store image."))?;

    Ok(relative)
}
