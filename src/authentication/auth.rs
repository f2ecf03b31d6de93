use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    app_state::SharedState, data_access::data_context::DataContext, error::AppError,
    settings::Settings, user::User,
};

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

// ── Session tokens ─────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn create_token(user: &User, settings: &Settings) -> Result<String, AuthError> {
    let now = Utc::now();
    let expiry = now + Duration::minutes(settings.session_expiration_in_minutes);

    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        exp: expiry.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.session_secret.as_bytes()),
    )?)
}

pub fn verify_token(token: &str, settings: &Settings) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.session_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn session_cookie(token: &str, settings: &Settings) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.session_expiration_in_minutes * 60
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Bearer header first, then the session cookie.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// ── Passwords ──────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Look the user up and check the password.
pub fn authenticate(
    data_context: &DataContext,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = data_context
        .get_user_by_username(username.trim())?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials.into());
    }
    Ok(user)
}

/// Seed the configured admin account if no users exist. Returns true if created.
pub fn ensure_default_user(
    data_context: &DataContext,
    settings: &Settings,
) -> Result<bool, AppError> {
    if !data_context.list_users()?.is_empty() {
        return Ok(false);
    }

    let password_hash = hash_password(&settings.default_admin_password)?;
    let admin = User::new(
        &settings.default_admin_username,
        &settings.default_admin_email,
        password_hash,
    );
    data_context.create_user(&admin)?;
    Ok(true)
}

// ── Extractor ──────────────────────────────────────────────────

/// The logged-in user, if any. A missing, expired or forged token is
/// treated as anonymous rather than an error.
pub struct CurrentUser(pub Option<User>);

#[axum::async_trait]
impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers) else {
            return Ok(CurrentUser(None));
        };

        let claims = match verify_token(&token, &state.settings) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring invalid session token");
                return Ok(CurrentUser(None));
            }
        };

        Ok(CurrentUser(state.data_context.get_user(claims.sub)?))
    }
}
