//! Response construction.
//!
//! # Responsibilities
//! - Relay a successful upstream response with the proxy's caching policy
//! - Map every pipeline failure to exactly one client response
//!
//! # Design Decisions
//! - Bodies are fully buffered upstream, written verbatim here
//! - Upstream caching directives are replaced, never merged
//! - Transport failure detail stays in logs; the client sees a fixed message

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::security::target::TargetError;
use crate::upstream::{FetchError, UpstreamResponse};

/// Cache directive set on every relayed body.
pub const CACHE_CONTROL_VALUE: &str = "public, max-age=3600";

/// Content type used when upstream does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub const FETCH_FAILED_MESSAGE: &str = "Upstream fetch failed.";

/// Terminal state of one proxied request, used for logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Relayed,
    RejectedInvalid,
    RejectedHost,
    UpstreamError,
    FetchFailed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Relayed => "relayed",
            Outcome::RejectedInvalid => "rejected_invalid",
            Outcome::RejectedHost => "rejected_host",
            Outcome::UpstreamError => "upstream_error",
            Outcome::FetchFailed => "fetch_failed",
        }
    }
}

/// Every way the proxy pipeline can end without relaying a body.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("upstream answered {status} {reason}")]
    UpstreamStatus { status: StatusCode, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Target(e) => e.status(),
            ProxyError::UpstreamStatus { status, .. } => *status,
            ProxyError::Fetch(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            ProxyError::Target(e) if e.is_policy() => Outcome::RejectedHost,
            ProxyError::Target(_) => Outcome::RejectedInvalid,
            ProxyError::UpstreamStatus { .. } => Outcome::UpstreamError,
            ProxyError::Fetch(_) => Outcome::FetchFailed,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::Target(e) => (e.status(), e.client_message()).into_response(),
            ProxyError::UpstreamStatus { status, reason } => (status, reason).into_response(),
            ProxyError::Fetch(_) => (StatusCode::BAD_GATEWAY, FETCH_FAILED_MESSAGE).into_response(),
        }
    }
}

/// Turn an upstream answer into the client response, or the error it maps to.
pub fn relay(upstream: UpstreamResponse) -> Result<Response, ProxyError> {
    if !upstream.status.is_success() {
        return Err(ProxyError::UpstreamStatus {
            status: upstream.status,
            reason: upstream.reason,
        });
    }

    let content_type = upstream
        .content_type
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    Ok((
        upstream.status,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE)),
        ],
        upstream.body,
    )
        .into_response())
}
