//! Upstream fetch subsystem.
//!
//! # Data Flow
//! ```text
//! validated target URL
//!     → client.rs (GET with browser User-Agent, deadline, guarded redirects)
//!     → UpstreamResponse (status, content type, fully buffered body)
//!     → http::response (relay to the client)
//! ```
//!
//! # Design Decisions
//! - One attempt per request; the client is responsible for retrying
//! - Bodies of non-2xx responses are never read
//! - Transport failures keep their detail for logs only

pub mod client;

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode};
use url::Url;

pub use client::HttpUpstream;

/// Boxed error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What came back from the upstream host.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Status text as sent by the upstream, or the canonical one.
    pub reason: String,
    pub content_type: Option<HeaderValue>,
    /// Complete body; empty when `status` is not a success.
    pub body: Bytes,
}

/// Failures below the HTTP layer. An upstream answering with an error status
/// is not a `FetchError`.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("upstream transport failure: {0}")]
    Transport(#[source] BoxError),
}

/// Fetches a validated target.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, target: &Url) -> Result<UpstreamResponse, FetchError>;
}
