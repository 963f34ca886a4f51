use std::time::Duration;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{errors::AppError, utils::random_token};

pub const ACCESS: &str = "access";
pub const REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and checks HS256 access/refresh tokens.
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, access_lifetime: Duration, refresh_lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_lifetime,
            refresh_lifetime,
        }
    }

    pub fn issue_pair(&self, user_id: u64) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.issue(user_id, ACCESS, self.access_lifetime)?,
            refresh: self.issue(user_id, REFRESH, self.refresh_lifetime)?,
        })
    }

    /// Exchanges a valid refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = self.verify(refresh_token, REFRESH)?;
        self.issue(claims.user_id, ACCESS, self.access_lifetime)
    }

    /// Returns the user id of a valid access token.
    pub fn verify_access(&self, token: &str) -> Result<u64, AppError> {
        Ok(self.verify(token, ACCESS)?.user_id)
    }

    fn issue(&self, user_id: u64, token_type: &str, lifetime: Duration) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            token_type: token_type.to_string(),
            exp: now + lifetime.as_secs() as i64,
            iat: now,
            jti: random_token(32),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    fn verify(&self, token: &str, expected_type: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.token_type != expected_type {
            return Err(AppError::Token(
                jsonwebtoken::errors::ErrorKind::InvalidToken.into(),
            ));
        }
        Ok(data.claims)
    }
}

/// Argon2id password hashing.
pub struct Passwords {
    hasher: Argon2<'static>,
}

impl Passwords {
    pub fn new(memory_kib: u32) -> Result<Self, AppError> {
        let params = Params::new(
            memory_kib,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| AppError::PasswordHash(e.to_string()))?;
        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        let salt = SaltString::encode_b64(&bytes)?;
        Ok(self
            .hasher
            .hash_password(password.as_bytes(), &salt)?
            .to_string())
    }

    /// `false` for a wrong password and for a hash that cannot be parsed.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .hasher
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
