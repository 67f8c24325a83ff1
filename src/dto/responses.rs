use crate::{
    db::Database,
    models::{Comment, Group, Post, User},
    pagination::Page,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: u64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Public view of a user, without contact details.
#[derive(Debug, Serialize)]
pub struct AuthorSummary {
    pub id: u64,
    pub username: String,
    pub full_name: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: format!("{} {}", user.first_name, user.last_name)
                .trim()
                .to_string(),
        }
    }
}

impl AuthorSummary {
    fn load(db: &Database, id: u64) -> Self {
        match db.user(id) {
            Some(user) => Self::from(&user),
            None => Self {
                id,
                username: String::new(),
                full_name: String::new(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            title: group.title,
            slug: group.slug,
            description: group.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: u64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub image: Option<String>,
    pub author: AuthorSummary,
    pub group: Option<GroupResponse>,
}

impl PostResponse {
    /// Joins the post with its author and group.
    pub fn load(db: &Database, post: Post) -> Self {
        Self {
            author: AuthorSummary::load(db, post.author_id),
            group: post.group_id.and_then(|id| db.group(id)).map(GroupResponse::from),
            id: post.id,
            text: post.text,
            created_at: post.created_at,
            image: post.image,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: u64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
}

impl CommentResponse {
    pub fn load(db: &Database, comment: Comment) -> Self {
        Self {
            author: AuthorSummary::load(db, comment.author_id),
            id: comment.id,
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

/// GET / and GET /follow/
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub page: Page<PostResponse>,
}

/// GET /group/{slug}/
#[derive(Debug, Serialize)]
pub struct GroupFeedResponse {
    pub group: GroupResponse,
    pub page: Page<PostResponse>,
}

/// GET /profile/{username}/
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub author: AuthorSummary,
    pub posts_count: usize,
    pub following: bool,
    pub page: Page<PostResponse>,
}

/// GET /posts/{post_id}/
#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    pub post: PostResponse,
    pub author_posts_count: usize,
    pub comments: Vec<CommentResponse>,
}

/// GET /create/ and GET /posts/{post_id}/edit/
#[derive(Debug, Serialize)]
pub struct PostFormResponse {
    pub is_edit: bool,
    pub post: Option<PostResponse>,
    /// Choices for the `group` field.
    pub groups: Vec<GroupResponse>,
}

/// GET /create_group/
#[derive(Debug, Serialize)]
pub struct GroupFormResponse {
    pub fields: &'static [&'static str],
}
