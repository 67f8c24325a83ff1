use crate::errors::ApiError;
use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::debug;

struct CachedResponse {
    body: Bytes,
    content_type: Option<HeaderValue>,
    expires_at: Instant,
}

/// Whole-response cache keyed by request path and query.
///
/// Entries only leave by expiry, culling or `clear`; writes do not
/// invalidate them, so a cached feed can lag behind new posts for up to one
/// TTL. At most `max_entries` responses are held.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CachedResponse>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn lookup(&self, key: &str) -> Option<Response> {
        let now = Instant::now();
        let hit = self.entries.get(key).and_then(|entry| {
            (entry.expires_at > now).then(|| {
                let mut response = Response::new(Body::from(entry.body.clone()));
                if let Some(content_type) = &entry.content_type {
                    response
                        .headers_mut()
                        .insert(header::CONTENT_TYPE, content_type.clone());
                }
                response
            })
        });
        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        hit
    }

    fn store(&self, key: String, content_type: Option<HeaderValue>, body: Bytes) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.cull();
        }
        self.entries.insert(
            key,
            CachedResponse {
                body,
                content_type,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drops expired entries, then a third of the rest (soonest to expire
    /// first) if the cache is still full.
    fn cull(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        if self.entries.len() < self.max_entries {
            return;
        }

        let mut by_expiry: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.expires_at, entry.key().clone()))
            .collect();
        by_expiry.sort();
        let doomed = (by_expiry.len() / 3).max(1);
        for (_, key) in by_expiry.into_iter().take(doomed) {
            self.entries.remove(&key);
        }
        debug!("Culled {} cached responses", doomed);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Middleware serving GET requests from `cache`, storing `200 OK` misses.
pub async fn cache_page(State(cache): State<ResponseCache>, request: Request, next: Next) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = request.uri().to_string();
    if let Some(response) = cache.lookup(&key) {
        debug!("Cache hit: {}", key);
        return response;
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::InternalError(format!("Failed to buffer response: {}", e)).into_response();
        }
    };
    cache.store(key, parts.headers.get(header::CONTENT_TYPE).cloned(), bytes.clone());

    Response::from_parts(parts, Body::from(bytes))
}
