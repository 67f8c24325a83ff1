#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;
use yatube::{
    AppState,
    auth::create_token,
    config::Config,
    db::{NewGroup, NewPost, NewUser},
    models::{Group, Post, User},
    router,
};

pub const SECRET: &str = "test-secret";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Texts of the posts on the returned page.
    pub fn page_texts(&self) -> Vec<String> {
        self.json()["page"]["items"]
            .as_array()
            .expect("no page in response")
            .iter()
            .map(|post| post["text"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub app: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let mut config = Config::with_secret(SECRET);
        config.bcrypt_cost = 4;
        let state = AppState::new(config);
        Self {
            app: router(state.clone()),
            state,
        }
    }

    pub fn per_page(&self) -> usize {
        self.state.config.posts_per_page
    }

    pub fn create_user(&self, username: &str) -> User {
        self.state
            .db
            .create_user(
                NewUser {
                    username: username.to_string(),
                    first_name: String::new(),
                    last_name: String::new(),
                    email: format!("{username}@example.com"),
                    hashed_password: String::new(),
                },
                Utc::now(),
            )
            .expect("failed to create user")
    }

    pub fn create_group(&self, slug: &str, title: &str) -> Group {
        self.state
            .db
            .create_group(
                NewGroup {
                    title: title.to_string(),
                    slug: slug.to_string(),
                    description: "Test description".to_string(),
                },
                Utc::now(),
            )
            .expect("failed to create group")
    }

    pub fn create_post_at(
        &self,
        author: &User,
        group: Option<&Group>,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Post {
        self.state
            .db
            .create_post(
                NewPost {
                    author_id: author.id,
                    group_id: group.map(|g| g.id),
                    text: text.to_string(),
                    image: None,
                },
                created_at,
            )
            .expect("failed to create post")
    }

    pub fn create_post(&self, author: &User, group: Option<&Group>, text: &str) -> Post {
        self.create_post_at(author, group, text, Utc::now())
    }

    pub fn token(&self, user: &User) -> String {
        create_token(user, SECRET, 1).expect("failed to create token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        as_user: Option<&User>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = as_user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let response = self.app.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body")
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, as_user: Option<&User>) -> TestResponse {
        self.request(Method::GET, uri, as_user, None).await
    }

    pub async fn post(&self, uri: &str, as_user: Option<&User>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, as_user, Some(body)).await
    }
}
