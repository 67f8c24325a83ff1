use crate::errors::FormErrors;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Validate, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "Password must be 8-100 characters"))]
    pub password1: String,
    pub password2: String,
}

impl SignupRequest {
    /// Checks the rules the derive can't express.
    pub fn extra_errors(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if !is_valid_username(&self.username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        errors
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Validate, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
    #[serde(default)]
    pub group: Option<u64>,
    /// File name of an uploaded image.
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub image: Option<String>,
}

#[derive(Debug, Validate, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
}

#[derive(Debug, Validate, Deserialize)]
pub struct GroupForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Slug must be 1-50 characters"))]
    pub slug: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub description: String,
}

const IMAGE_EXTENSIONS: [&str; 5] = ["gif", "jpeg", "jpg", "png", "webp"];

/// Where an uploaded image is stored, or `None` if `name` is not an image
/// file name.
pub fn image_path(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?;
    let (stem, extension) = name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    if stem.is_empty() || !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    Some(format!("posts/{name}"))
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}
