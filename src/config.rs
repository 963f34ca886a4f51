//! Configuration management for tunescout.
//!
//! This module handles loading and accessing configuration values from
//! environment variables and `.env` files. Values are read once into a
//! [`Settings`] struct that is shared by the server and the CLI.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. `.env` file in the working directory
//! 4. Application defaults (where applicable)

use std::{env, path::PathBuf, time::Duration};

use crate::errors::AppError;

/// Loads environment variables from `.env` files.
///
/// Creates the local data directory if it doesn't exist, then loads
/// `tunescout/.env` from it followed by a `.env` in the working directory.
/// Variables that are already set are never overridden, and missing files
/// are not an error.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/tunescout/.env`
/// - macOS: `~/Library/Application Support/tunescout/.env`
/// - Windows: `%LOCALAPPDATA%/tunescout/.env`
///
/// # Errors
///
/// Returns an error if the data directory cannot be created or an existing
/// `.env` file cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    dotenv::dotenv().ok();
    Ok(())
}

/// Returns the platform-specific data directory used for the database,
/// uploaded media and the `.env` file.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("tunescout");
    path
}

/// Output format of the `tracing` subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Base URLs of the third-party APIs.
///
/// `wikipedia` is a template: `{lang}` is replaced with the requested
/// language code.
#[derive(Debug, Clone)]
pub struct UpstreamUrls {
    pub lastfm: String,
    pub itunes: String,
    pub deezer: String,
    pub wikipedia: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self {
            lastfm: "https://ws.audioscrobbler.com/2.0/".to_string(),
            itunes: "https://itunes.apple.com/search".to_string(),
            deezer: "https://api.deezer.com".to_string(),
            wikipedia: "https://{lang}.wikipedia.org/api/rest_v1".to_string(),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    /// HMAC secret for access and refresh tokens. Only the server needs it.
    pub secret_key: Option<String>,
    pub lastfm_key: String,
    /// `None` keeps the database in memory.
    pub database_path: Option<PathBuf>,
    pub media_root: PathBuf,
    pub static_root: PathBuf,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    /// Argon2 memory cost in KiB.
    pub password_memory_kib: u32,
    pub upstream: UpstreamUrls,
    pub log_format: LogFormat,
}

impl Settings {
    /// Settings with defaults everywhere except the two keys, an in-memory
    /// database and media under the system temp directory.
    pub fn new(secret_key: &str, lastfm_key: &str) -> Self {
        Self {
            server_addr: "127.0.0.1:8000".to_string(),
            secret_key: Some(secret_key.to_string()),
            lastfm_key: lastfm_key.to_string(),
            database_path: None,
            media_root: env::temp_dir().join("tunescout-media"),
            static_root: PathBuf::from("static"),
            access_token_lifetime: Duration::from_secs(300),
            refresh_token_lifetime: Duration::from_secs(86_400),
            password_memory_kib: argon2::Params::DEFAULT_M_COST,
            upstream: UpstreamUrls::default(),
            log_format: LogFormat::Pretty,
        }
    }

    /// Reads settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when `LASTFM_KEY` is missing or a numeric
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = UpstreamUrls::default();
        let data = data_dir();

        Ok(Self {
            server_addr: optional("SERVER_ADDRESS", "127.0.0.1:8000"),
            secret_key: env::var("SECRET_KEY").ok().filter(|s| !s.is_empty()),
            lastfm_key: required("LASTFM_KEY")?,
            database_path: Some(
                env::var("DATABASE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data.join("db.json")),
            ),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data.join("media")),
            static_root: PathBuf::from(optional("STATIC_ROOT", "static")),
            access_token_lifetime: seconds("ACCESS_TOKEN_LIFETIME", 300)?,
            refresh_token_lifetime: seconds("REFRESH_TOKEN_LIFETIME", 86_400)?,
            password_memory_kib: number("PASSWORD_MEMORY_KIB", argon2::Params::DEFAULT_M_COST)?,
            upstream: UpstreamUrls {
                lastfm: optional("LASTFM_API_URL", &defaults.lastfm),
                itunes: optional("ITUNES_API_URL", &defaults.itunes),
                deezer: optional("DEEZER_API_URL", &defaults.deezer),
                wikipedia: optional("WIKIPEDIA_API_URL", &defaults.wikipedia),
            },
            log_format: match optional("LOG_FORMAT", "pretty").to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{name} must be set")))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn number(name: &str, default: u32) -> Result<u32, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} must be a positive integer"))),
        Err(_) => Ok(default),
    }
}

fn seconds(name: &str, default: u64) -> Result<Duration, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| AppError::Config(format!("{name} must be a number of seconds"))),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
