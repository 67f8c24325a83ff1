use crate::{
    AppState,
    auth::{CurrentUser, create_token, hash_password, verify_password},
    db::NewUser,
    dto::{AuthResponse, LoginRequest, SignupRequest, UserResponse},
    errors::{ApiError, FormErrors},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

/// POST /auth/signup/
/// Body: { "first_name": "...", "last_name": "...", "username": "...",
///         "email": "...", "password1": "...", "password2": "..." }
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let mut errors = payload.validate().err().map(FormErrors::from).unwrap_or_default();
    errors.merge(payload.extra_errors());
    errors.into_result()?;

    if state.db.user_by_username(&payload.username).is_some() {
        return Err(ApiError::UserAlreadyExists);
    }

    let hashed_password = hash_password(&payload.password1, state.config.bcrypt_cost)?;

    let user = state.db.create_user(
        NewUser {
            username: payload.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            hashed_password,
        },
        Utc::now(),
    )?;

    let token = create_token(&user, &state.config.jwt_secret, state.config.token_ttl_hours)?;

    info!("New user registered: {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// GET /auth/login/?next=/path/
/// Where anonymous users land; echoes back the page to return to.
pub async fn login_form(Query(query): Query<LoginQuery>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
      "fields": ["username", "password"],
      "next": query.next
    }))
}

/// POST /auth/login/
/// Body: { "username": "...", "password": "..." }
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::Validation(e.into()))?;

    state.login_limiter.check(&payload.username)?;

    // Find user by username
    let user = state
        .db
        .user_by_username(&payload.username)
        .ok_or(ApiError::InvalidCredentials)?;

    // Verify password
    if !verify_password(&payload.password, &user.hashed_password)? {
        warn!("Failed login for {}", user.username);
        return Err(ApiError::InvalidCredentials);
    }

    // Generate token
    let token = create_token(&user, &state.config.jwt_secret, state.config.token_ttl_hours)?;

    info!("User logged in: {}", user.username);

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// GET /users/me
/// Headers: Authorization: Bearer <token>
pub async fn get_current_user(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}
