//! Yatube: a small blogging platform. Authors write posts, file them into
//! groups, comment, and follow each other.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod feed;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod states;

pub use routes::router;
pub use states::AppState;
