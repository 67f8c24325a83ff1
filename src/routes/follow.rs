use crate::{
    AppState,
    auth::CurrentUser,
    dto::{FeedResponse, PostResponse},
    errors::ApiError,
    feed::{self, Scope},
    pagination::PageQuery,
    routes::{found, profile_url},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use tracing::info;

/// GET /follow/?page=N
/// Posts by every author the current user follows.
pub async fn follow_index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<FeedResponse>, ApiError> {
    let feed = feed::assemble(
        &state.db,
        Scope::Followed(user.id),
        query.page.as_deref(),
        state.config.posts_per_page,
    )?;

    Ok(Json(FeedResponse {
        page: feed.page.map(|post| PostResponse::load(&state.db, post)),
    }))
}

/// GET|POST /profile/{username}/follow/
/// Repeat follows and following yourself are no-ops.
pub async fn profile_follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let author = state.db.user_by_username(&username).ok_or(ApiError::NotFound)?;

    if author.id != user.id && state.db.follow(user.id, author.id)? {
        info!("{} now follows {}", user.username, author.username);
    }

    Ok(found(&profile_url(&author.username)))
}

/// GET|POST /profile/{username}/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let author = state.db.user_by_username(&username).ok_or(ApiError::NotFound)?;

    if state.db.unfollow(user.id, author.id) {
        info!("{} unfollowed {}", user.username, author.username);
    }

    Ok(found(&profile_url(&author.username)))
}
