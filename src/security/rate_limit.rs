//! Per-client admission control.
//!
//! A fixed window per client: the first request opens a window of
//! `window` length, every request in it (admitted or not) counts, and the
//! window resets once it has elapsed. Rejected requests get 429 before any
//! other stage runs.
//!
//! Every response carries the standard `RateLimit-*` headers; rejections also
//! carry `Retry-After`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::headers::client_ip;

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Try again later.";

const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's window resets.
    pub reset_after: Duration,
    pub window: Duration,
}

impl Admission {
    /// Write the standard rate-limit headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let reset_secs = self.reset_after.as_secs_f64().ceil() as u64;
        if let Ok(policy) = HeaderValue::try_from(format!("{};w={}", self.limit, self.window.as_secs())) {
            headers.insert(RATELIMIT_POLICY, policy);
        }
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(reset_secs));
        if !self.allowed {
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(reset_secs));
        }
    }
}

/// Admission-control seam. Implementations decide whether the client may
/// proceed and account for the request.
pub trait AdmissionControl: Send + Sync {
    fn check(&self, client: &str) -> Admission;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// In-memory fixed-window limiter keyed by client identifier.
///
/// Counters live for the process lifetime only.
pub struct MemoryRateLimiter {
    windows: DashMap<String, Window>,
    limit: u32,
    window: Duration,
}

impl MemoryRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Check and count a request made at `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> Admission {
        // The entry guard holds the shard lock, so the reset and increment
        // are atomic per client.
        let mut entry = self
            .windows
            .entry(client.to_string())
            .or_insert(Window { started: now, hits: 0 });

        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window { started: now, hits: 0 };
        }
        entry.hits = entry.hits.saturating_add(1);

        let elapsed = now.saturating_duration_since(entry.started);
        Admission {
            allowed: entry.hits <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(entry.hits),
            reset_after: self.window.saturating_sub(elapsed),
            window: self.window,
        }
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl AdmissionControl for MemoryRateLimiter {
    fn check(&self, client: &str) -> Admission {
        self.check_at(client, Instant::now())
    }
}

/// State for the admission middleware.
#[derive(Clone)]
pub struct AdmissionState {
    pub control: Arc<dyn AdmissionControl>,
    pub trusted_proxy_hops: usize,
}

/// Middleware function applying admission control ahead of the proxy handler.
pub async fn rate_limit_middleware(
    State(state): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_ip(request.headers(), peer, state.trusted_proxy_hops)
        .unwrap_or_else(|| "unknown".to_string());

    let admission = state.control.check(&client);

    let mut response = if admission.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, limit = admission.limit, "Rate limit exceeded");
        metrics::record_rate_limited();
        (StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE).into_response()
    };

    admission.apply_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(900);

    #[test]
    fn test_limit_reached_on_sixty_first_request() {
        let limiter = MemoryRateLimiter::new(60, WINDOW);
        let start = Instant::now();

        for i in 0..60 {
            let a = limiter.check_at("1.2.3.4", start + Duration::from_secs(i));
            assert!(a.allowed, "request {} should be admitted", i + 1);
            assert_eq!(a.remaining, 59 - i as u32);
        }

        let denied = limiter.check_at("1.2.3.4", start + Duration::from_secs(60));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_after, WINDOW - Duration::from_secs(60));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = MemoryRateLimiter::new(1, WINDOW);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
    }

    #[test]
    fn test_window_resets_after_elapsing() {
        let limiter = MemoryRateLimiter::new(2, WINDOW);
        let start = Instant::now();
        assert!(limiter.check_at("a", start).allowed);
        assert!(limiter.check_at("a", start).allowed);
        assert!(!limiter.check_at("a", start + WINDOW - Duration::from_secs(1)).allowed);

        let fresh = limiter.check_at("a", start + WINDOW);
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 1);
        assert_eq!(fresh.reset_after, WINDOW);
    }

    #[test]
    fn test_purge_expired() {
        let limiter = MemoryRateLimiter::new(5, WINDOW);
        let start = Instant::now();
        limiter.check_at("old", start);
        limiter.check_at("new", start + Duration::from_secs(600));

        assert_eq!(limiter.purge_expired(start + WINDOW), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_headers() {
        let limiter = MemoryRateLimiter::new(1, WINDOW);
        let now = Instant::now();

        let mut headers = HeaderMap::new();
        limiter.check_at("a", now).apply_headers(&mut headers);
        assert_eq!(headers["ratelimit-policy"], "1;w=900");
        assert_eq!(headers["ratelimit-limit"], "1");
        assert_eq!(headers["ratelimit-remaining"], "0");
        assert_eq!(headers["ratelimit-reset"], "900");
        assert!(headers.get("retry-after").is_none());

        let mut headers = HeaderMap::new();
        limiter
            .check_at("a", now + Duration::from_millis(1500))
            .apply_headers(&mut headers);
        assert_eq!(headers["ratelimit-reset"], "899");
        assert_eq!(headers["retry-after"], "899");
    }
}
