use crate::{
    db::DbError,
    routes::{found, login_url},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;
use validator::ValidationErrors;

/// Field name -> messages, the body of a rejected form.
#[derive(Debug, Default, Serialize)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            for err in field_errors.iter() {
                let message = match &err.message {
                    Some(message) => message.to_string(),
                    None => default_message(&err.code).to_string(),
                };
                form.add(&field, message);
            }
        }
        form
    }
}

fn default_message(code: &str) -> &'static str {
    match code {
        "length" => "Ensure this value has a valid length.",
        "email" => "Enter a valid email address.",
        "required" => "This field is required.",
        _ => "Enter a valid value.",
    }
}

#[derive(Debug)]
pub enum ApiError {
    InvalidCredentials,
    UserAlreadyExists,
    /// No usable session; the client is sent to the login page and back.
    LoginRequired { next: String },
    NotFound,
    TooManyRequests,
    Validation(FormErrors),
    InternalError(String),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UsernameTaken(_) => ApiError::UserAlreadyExists,
            DbError::SlugTaken(_) => {
                let mut errors = FormErrors::default();
                errors.add("slug", "Group with this slug already exists.");
                ApiError::Validation(errors)
            }
            DbError::NotFound(_) => ApiError::NotFound,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            ApiError::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not Found"),
            ApiError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, "Too many attempts, try again later"),
            ApiError::LoginRequired { next } => {
                return found(&login_url(&next));
            }
            ApiError::Validation(errors) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                      "errors": errors
                    })),
                )
                    .into_response();
            }
            ApiError::InternalError(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (
            status,
            Json(serde_json::json!({
              "error": message,
              "status": status.as_u16()
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn login_required_redirects_with_next() {
        let response = ApiError::LoginRequired {
            next: "/create/".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/login/?next=%2Fcreate%2F"
        );
    }

    #[test]
    fn duplicate_slug_becomes_a_field_error() {
        let ApiError::Validation(errors) = ApiError::from(DbError::SlugTaken("cats".into())) else {
            panic!("expected a validation error");
        };
        assert!(errors.get("slug").is_some());
    }

    #[test]
    fn empty_form_errors_pass() {
        assert!(FormErrors::default().into_result().is_ok());
    }
}
