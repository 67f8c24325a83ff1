pub mod follow;
pub mod group;
pub mod health;
pub mod post;
pub mod user;

use crate::{cache::cache_page, errors::ApiError, states::AppState};
use axum::{
    Router,
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Login page that sends the user back to `next` afterwards.
pub fn login_url(next: &str) -> String {
    format!("/auth/login/?next={}", urlencoding::encode(next))
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn post_detail_url(post_id: u64) -> String {
    format!("/posts/{post_id}/")
}

pub fn group_url(slug: &str) -> String {
    format!("/group/{slug}/")
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let index = get(post::index).layer(from_fn_with_state(state.index_cache.clone(), cache_page));
    let max_in_flight = state.config.max_concurrent_requests;

    Router::new()
        // Feeds
        .route("/", index)
        .route("/group/{slug}/", get(post::group_posts))
        .route("/profile/{username}/", get(post::profile))
        .route("/follow/", get(follow::follow_index))
        // Posts and comments
        .route("/posts/{post_id}/", get(post::post_detail).delete(post::delete_post))
        .route("/posts/{post_id}/edit/", get(post::edit_post_form).post(post::edit_post))
        .route("/posts/{post_id}/comment/", post(post::add_comment))
        .route("/create/", get(post::create_post_form).post(post::create_post))
        // Groups
        .route("/create_group/", get(group::create_group_form).post(group::create_group))
        // Follow graph
        .route(
            "/profile/{username}/follow/",
            get(follow::profile_follow).post(follow::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(follow::profile_unfollow).post(follow::profile_unfollow),
        )
        // Accounts
        .route("/auth/signup/", post(user::signup))
        .route("/auth/login/", get(user::login_form).post(user::login))
        .route("/users/me", get(user::get_current_user))
        .route("/health", get(health::health_check))
        .fallback(not_found)
        .with_state(state)
        .layer(GlobalConcurrencyLimitLayer::new(max_in_flight))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
