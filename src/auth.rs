use crate::{errors::ApiError, models::User, states::AppState};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    num::NonZeroU32,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub username: String,
    pub exp: usize,
}

pub fn create_token(user: &User, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| ApiError::InternalError("Failed to calculate expiration".into()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::InternalError(format!("Token Creation failed: {}", e)))
}

/// Decodes the `Authorization: Bearer` token, if there is a valid one.
pub fn validate_token(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// The user behind the request's token. Tokens for deleted users are
/// treated like no token at all.
fn session_user(headers: &HeaderMap, state: &AppState) -> Option<User> {
    let claims = validate_token(headers, &state.config.jwt_secret)?;
    let user_id = claims.sub.parse().ok()?;
    state.db.user(user_id)
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    hash(password, cost).map_err(|e| ApiError::InternalError(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hashed: &str) -> Result<bool, ApiError> {
    verify(password, hashed)
        .map_err(|e| ApiError::InternalError(format!("Password verification failed: {}", e)))
}

/// Extractor for routes that need a logged-in user. Anonymous requests are
/// redirected to the login page with the requested path as `next`.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_user(&parts.headers, state)
            .map(CurrentUser)
            .ok_or_else(|| ApiError::LoginRequired {
                next: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string()),
            })
    }
}

/// Extractor for pages that look different for logged-in users but are
/// public.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(session_user(&parts.headers, state)))
    }
}

/// Per-username throttle for login attempts.
///
/// Every `SWEEP_EVERY` checks, usernames whose quota has fully refilled are
/// forgotten, so probing many names does not grow the limiter forever.
pub struct LoginLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    checks: AtomicU64,
}

const SWEEP_EVERY: u64 = 256;

impl LoginLimiter {
    pub fn per_minute(attempts: u32) -> Self {
        let attempts = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(attempts)),
            checks: AtomicU64::new(0),
        }
    }

    pub fn check(&self, username: &str) -> Result<(), ApiError> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }

        self.limiter.check_key(&username.to_string()).map_err(|_| {
            warn!("Login rate limit hit for {}", username);
            ApiError::TooManyRequests
        })
    }

    fn sweep(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of usernames currently tracked.
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}
