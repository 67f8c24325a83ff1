use crate::{
    AppState,
    auth::{CurrentUser, MaybeUser},
    db::{Database, NewComment, NewPost},
    dto::{
        CommentForm, CommentResponse, FeedResponse, GroupFeedResponse, GroupResponse,
        PostDetailResponse, PostForm, PostFormResponse, PostResponse, ProfileResponse, image_path,
    },
    errors::{ApiError, FormErrors},
    feed::{self, Scope},
    models::Post,
    pagination::PageQuery,
    routes::{found, post_detail_url, profile_url},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::info;
use validator::Validate;

/// Post ids come from the URL as text so that `/posts/abc/` is a 404
/// rather than a rejected request.
fn find_post(db: &Database, raw_id: &str) -> Result<Post, ApiError> {
    let id: u64 = raw_id.parse().map_err(|_| ApiError::NotFound)?;
    db.post(id).ok_or(ApiError::NotFound)
}

/// Validated fields of a post form.
struct CleanPost {
    text: String,
    group_id: Option<u64>,
    image: Option<String>,
}

fn clean_post_form(db: &Database, form: PostForm) -> Result<CleanPost, ApiError> {
    let form = PostForm {
        text: form.text.trim().to_string(),
        ..form
    };
    let mut errors = form.validate().err().map(FormErrors::from).unwrap_or_default();

    if let Some(group_id) = form.group {
        if db.group(group_id).is_none() {
            errors.add(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            );
        }
    }

    let image = match form.image.as_deref() {
        Some(name) => {
            let path = image_path(name);
            if path.is_none() {
                errors.add(
                    "image",
                    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                );
            }
            path
        }
        None => None,
    };

    errors.into_result()?;
    Ok(CleanPost {
        text: form.text,
        group_id: form.group,
        image,
    })
}

fn group_choices(db: &Database) -> Vec<GroupResponse> {
    db.groups().into_iter().map(GroupResponse::from).collect()
}

/// GET /?page=N
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FeedResponse>, ApiError> {
    let feed = feed::assemble(&state.db, Scope::All, query.page.as_deref(), state.config.posts_per_page)?;

    Ok(Json(FeedResponse {
        page: feed.page.map(|post| PostResponse::load(&state.db, post)),
    }))
}

/// GET /group/{slug}/?page=N
pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GroupFeedResponse>, ApiError> {
    let feed = feed::assemble(
        &state.db,
        Scope::Group(&slug),
        query.page.as_deref(),
        state.config.posts_per_page,
    )?;
    let group = feed.group.ok_or(ApiError::NotFound)?;

    Ok(Json(GroupFeedResponse {
        group: group.into(),
        page: feed.page.map(|post| PostResponse::load(&state.db, post)),
    }))
}

/// GET /profile/{username}/?page=N
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let feed = feed::assemble(
        &state.db,
        Scope::Author(&username),
        query.page.as_deref(),
        state.config.posts_per_page,
    )?;
    let author = feed.author.ok_or(ApiError::NotFound)?;
    let following = viewer.is_some_and(|viewer| state.db.is_following(viewer.id, author.id));

    Ok(Json(ProfileResponse {
        author: (&author).into(),
        posts_count: feed.page.count,
        following,
        page: feed.page.map(|post| PostResponse::load(&state.db, post)),
    }))
}

/// GET /posts/{post_id}/
pub async fn post_detail(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let post = find_post(&state.db, &post_id)?;
    let author_posts_count = state.db.count_posts_by(post.author_id);
    let comments = state
        .db
        .comments_for_post(post.id)
        .into_iter()
        .map(|comment| CommentResponse::load(&state.db, comment))
        .collect();

    Ok(Json(PostDetailResponse {
        post: PostResponse::load(&state.db, post),
        author_posts_count,
        comments,
    }))
}

/// GET /create/
pub async fn create_post_form(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Json<PostFormResponse> {
    Json(PostFormResponse {
        is_edit: false,
        post: None,
        groups: group_choices(&state.db),
    })
}

/// POST /create/
/// Body: { "text": "...", "group": 1, "image": "small.gif" }
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PostForm>,
) -> Result<Response, ApiError> {
    let clean = clean_post_form(&state.db, payload)?;

    let post = state.db.create_post(
        NewPost {
            author_id: user.id,
            group_id: clean.group_id,
            text: clean.text,
            image: clean.image,
        },
        Utc::now(),
    )?;

    info!("Post created: {} by user {}", post.id, user.username);

    Ok(found(&profile_url(&user.username)))
}

/// GET /posts/{post_id}/edit/
pub async fn edit_post_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Response, ApiError> {
    let post = find_post(&state.db, &post_id)?;
    if post.author_id != user.id {
        return Ok(found(&post_detail_url(post.id)));
    }

    Ok(Json(PostFormResponse {
        is_edit: true,
        groups: group_choices(&state.db),
        post: Some(PostResponse::load(&state.db, post)),
    })
    .into_response())
}

/// POST /posts/{post_id}/edit/
/// Only the author may edit; anyone else is sent back to the post unchanged.
pub async fn edit_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
    Json(payload): Json<PostForm>,
) -> Result<Response, ApiError> {
    let post = find_post(&state.db, &post_id)?;
    if post.author_id != user.id {
        return Ok(found(&post_detail_url(post.id)));
    }

    let clean = clean_post_form(&state.db, payload)?;
    state.db.update_post(post.id, |post| {
        post.text = clean.text;
        post.group_id = clean.group_id;
        if clean.image.is_some() {
            post.image = clean.image;
        }
    })?;

    info!("Post edited: {} by user {}", post.id, user.username);

    Ok(found(&post_detail_url(post.id)))
}

/// DELETE /posts/{post_id}/
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Response, ApiError> {
    let post = find_post(&state.db, &post_id)?;

    // Check ownership
    if post.author_id != user.id {
        return Ok(found(&post_detail_url(post.id)));
    }

    state.db.delete_post(post.id)?;

    info!("Post deleted: {} by user {}", post.id, user.username);

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /posts/{post_id}/comment/
/// Body: { "text": "..." }
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
    Json(payload): Json<CommentForm>,
) -> Result<Response, ApiError> {
    let post = find_post(&state.db, &post_id)?;

    let form = CommentForm {
        text: payload.text.trim().to_string(),
    };
    form.validate().map_err(|e| ApiError::Validation(e.into()))?;

    let comment = state.db.create_comment(
        NewComment {
            post_id: post.id,
            author_id: user.id,
            text: form.text,
        },
        Utc::now(),
    )?;

    info!("Comment created: {} on post {} by user {}", comment.id, post.id, user.username);

    Ok(found(&post_detail_url(post.id)))
}
