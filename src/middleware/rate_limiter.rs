//! Token-bucket rate limiting
//!
//! One limiter type serves both the per-IP request layer and the
//! per-address challenge throttle.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self, refill_per_second: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_per_second).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Keyed token-bucket limiter
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    refill_per_second: f64,
    capacity: f64,
}

impl RateLimiter {
    /// `requests_per_second` sustained, with bursts of twice that.
    pub fn new(requests_per_second: u32) -> Self {
        Self::with_rate(requests_per_second as f64, (requests_per_second * 2) as f64)
    }

    /// At most `requests` per minute, all of which may arrive at once.
    pub fn per_minute(requests: u32) -> Self {
        Self::with_rate(requests as f64 / 60.0, requests as f64)
    }

    fn with_rate(refill_per_second: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            refill_per_second,
            capacity,
        }
    }

    /// Take one token for `key`. Returns false when the bucket is empty.
    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity));

        bucket.try_consume(self.refill_per_second, self.capacity)
    }

    /// Forget buckets idle for longer than `max_age`.
    pub async fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }

    pub async fn tracked_keys(&self) -> usize {
        self.buckets.read().await.len()
    }
}

/// Periodically drop idle buckets until the task is dropped.
pub async fn run_limiter_cleanup(limiter: RateLimiter, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        limiter.cleanup(every).await;
    }
}

/// Per-IP rate limiting for `axum::middleware::from_fn`
pub fn rate_limit_layer(
    rate_limiter: RateLimiter,
) -> impl Fn(
    Request<Body>,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
       + Clone
       + Send {
    move |request: Request<Body>, next: Next| {
        let rate_limiter = rate_limiter.clone();
        Box::pin(async move {
            let client_key = extract_client_ip(request.headers());

            if !rate_limiter.check(&client_key).await {
                tracing::warn!(client = %client_key, "Rate limit exceeded");
                let body = json!({
                    "error": {
                        "code": "TOO_MANY_REQUESTS",
                        "message": "Too many requests. Please try again later."
                    }
                });
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, "1")],
                    Json(body),
                )
                    .into_response();
            }

            next.run(request).await
        })
    }
}

/// Client IP from proxy headers, or `"unknown"`.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
    {
        return ip.trim().to_string();
    }

    if let Some(ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        return ip.trim().to_string();
    }

    "unknown".to_string()
}
