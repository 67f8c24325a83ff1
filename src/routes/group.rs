use crate::{
    AppState,
    auth::CurrentUser,
    db::NewGroup,
    dto::{GroupForm, GroupFormResponse, is_valid_slug},
    errors::{ApiError, FormErrors},
    routes::{found, group_url},
};
use axum::{Json, extract::State, response::Response};
use chrono::Utc;
use tracing::info;
use validator::Validate;

/// GET /create_group/
pub async fn create_group_form(CurrentUser(_user): CurrentUser) -> Json<GroupFormResponse> {
    Json(GroupFormResponse {
        fields: &["title", "slug", "description"],
    })
}

/// POST /create_group/
/// Body: { "title": "...", "slug": "...", "description": "..." }
pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<GroupForm>,
) -> Result<Response, ApiError> {
    let form = GroupForm {
        title: payload.title.trim().to_string(),
        slug: payload.slug.trim().to_string(),
        description: payload.description.trim().to_string(),
    };

    let mut errors = form.validate().err().map(FormErrors::from).unwrap_or_default();
    if !form.slug.is_empty() && !is_valid_slug(&form.slug) {
        errors.add(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        );
    }
    errors.into_result()?;

    // Duplicate slugs come back as a field error.
    let group = state.db.create_group(
        NewGroup {
            title: form.title,
            slug: form.slug,
            description: form.description,
        },
        Utc::now(),
    )?;

    info!("Group created: {} by user {}", group.slug, user.username);

    Ok(found(&group_url(&group.slug)))
}
