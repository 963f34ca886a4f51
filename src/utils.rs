use std::num::IntErrorKind;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use reqwest::Url;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Stable, URL-safe cache key component for free-form input.
pub fn digest_key(input: &str) -> String {
    let hash = Sha256::digest(input.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

pub fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Lower-cased and trimmed, for case-insensitive comparisons and cache keys.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parses a positive `limit` query parameter. Missing means `default`;
/// anything that is not an integer `>= 1` is `None`. Integers too large for
/// `usize` saturate so callers can clamp them.
pub fn parse_limit(raw: Option<&str>, default: usize) -> Option<usize> {
    let Some(raw) = raw else {
        return Some(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(n) => Some(n).filter(|n| *n >= 1),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(usize::MAX),
        Err(_) => None,
    }
}

/// Returns `value[key]` as a trimmed string, treating anything else as empty.
pub fn str_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

pub const PAGE_SIZE: usize = 14;
pub const MAX_PAGE_SIZE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub size: usize,
    pub num_pages: usize,
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

/// Splits `count` items into pages.
///
/// An unparsable or non-positive `page_size` falls back to [`PAGE_SIZE`] and
/// large ones are capped at [`MAX_PAGE_SIZE`]. `page` may be a number or
/// `"last"`; anything outside `1..=num_pages` is `None`.
pub fn paginate(count: usize, page: Option<&str>, page_size: Option<&str>) -> Option<PageWindow> {
    let size = page_size
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map(|n| n.min(MAX_PAGE_SIZE))
        .unwrap_or(PAGE_SIZE);

    let num_pages = count.div_ceil(size).max(1);
    let number = match page.map(str::trim) {
        None | Some("") => 1,
        Some("last") => num_pages,
        Some(raw) => raw.parse::<usize>().ok()?,
    };

    if number < 1 || number > num_pages {
        return None;
    }

    let start = (number - 1) * size;
    Some(PageWindow {
        number,
        size,
        num_pages,
        start,
        end: (start + size).min(count),
    })
}

/// Rewrites the `page` parameter of `url`. `None` removes it, which is what
/// the link to the first page uses.
pub fn replace_page_param(url: &str, page: Option<usize>) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(kept.iter());
        if let Some(page) = page {
            pairs.append_pair("page", &page.to_string());
        }
    }
    if parsed.query() == Some("") {
        parsed.set_query(None);
    }
    parsed.to_string()
}

// ---------------------------------------------------------------------------
// Account validation
// ---------------------------------------------------------------------------

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_USERNAME_LENGTH: usize = 150;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "admin123", "letmein1", "trustno1", "superman",
    "starwars", "whatever", "dragon12", "passw0rd", "abc12345", "11111111",
    "00000000", "q1w2e3r4", "1q2w3e4r", "zaq12wsx", "michael1", "computer",
];

pub fn validate_username(username: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if username.is_empty() {
        errors.push("This field may not be blank.".to_string());
        return errors;
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        errors.push(format!(
            "Ensure this field has no more than {MAX_USERNAME_LENGTH} characters."
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.push(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    errors
}

/// Returns every rule the password breaks; empty means acceptable.
pub fn validate_password(password: &str, username: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let lowered = password.to_lowercase();

    if too_similar(&lowered, username) {
        errors.push("The password is too similar to the username.".to_string());
    } else if too_similar(&lowered, email) || too_similar(&lowered, email_local_part(email)) {
        errors.push("The password is too similar to the email address.".to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        errors.push("This password is too common.".to_string());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }
    errors
}

fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or_default()
}

fn too_similar(password: &str, attribute: &str) -> bool {
    let attribute = attribute.trim().to_lowercase();
    if attribute.len() < 3 || password.is_empty() {
        return false;
    }
    password == attribute || password.contains(&attribute) || attribute.contains(password)
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// Detects an image format from its magic bytes and returns its extension.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}
