//! Target URL validation.
//!
//! Decides whether the client-supplied `url` names a resource the proxy may
//! fetch. Checks run in a fixed order and the first failure wins:
//!
//! ```text
//! presence → length → syntax → scheme → host allow-list
//! ```
//!
//! Host comparison is exact equality against [`ALLOWED_HOSTS`] after URL
//! normalization (lowercased host, default port dropped). No wildcard or
//! subdomain matching.

use axum::http::StatusCode;
use url::Url;

/// Hosts the proxy will fetch from.
pub const ALLOWED_HOSTS: [&str; 2] = ["books.google.com", "covers.openlibrary.org"];

/// Maximum accepted length of the `url` parameter, in characters.
pub const MAX_URL_LENGTH: usize = 2048;

/// Name of the query parameter carrying the target.
pub const TARGET_PARAM: &str = "url";

/// Reasons a target is refused before any upstream traffic happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("missing `url` query parameter")]
    Missing,

    #[error("target is {0} characters long")]
    TooLong(usize),

    #[error("target does not parse as an absolute URL: {0}")]
    Malformed(#[from] url::ParseError),

    #[error("scheme '{0}' is not http or https")]
    UnsupportedScheme(String),

    #[error("host '{0}' is not on the allow-list")]
    HostNotAllowed(String),
}

impl TargetError {
    /// HTTP status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            TargetError::TooLong(_) => StatusCode::URI_TOO_LONG,
            TargetError::HostNotAllowed(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Plain-text body returned to the client. Never carries the offending value.
    pub fn client_message(&self) -> &'static str {
        match self {
            TargetError::Missing => "Missing or invalid `url` parameter.",
            TargetError::TooLong(_) => "URL too long.",
            TargetError::Malformed(_) => "Malformed URL.",
            TargetError::UnsupportedScheme(_) => "Unsupported protocol.",
            TargetError::HostNotAllowed(_) => "Host not allowed.",
        }
    }

    /// Whether this is a policy rejection rather than bad input.
    pub fn is_policy(&self) -> bool {
        matches!(self, TargetError::HostNotAllowed(_))
    }
}

/// Extract the first `url` value from a raw query string.
///
/// Repeated parameters are never treated as a batch; later occurrences are ignored.
pub fn target_param(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TARGET_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Host as it appears in the authority: the hostname plus a port when it is
/// not the scheme's default.
pub fn authority_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Run the full validation chain over the raw parameter value.
pub fn validate_target(raw: Option<&str>) -> Result<Url, TargetError> {
    let raw = raw.ok_or(TargetError::Missing)?;

    let length = raw.chars().count();
    if length > MAX_URL_LENGTH {
        return Err(TargetError::TooLong(length));
    }

    let url = Url::parse(raw)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = authority_host(&url).unwrap_or_default();
    if !ALLOWED_HOSTS.contains(&host.as_str()) {
        return Err(TargetError::HostNotAllowed(host));
    }

    Ok(url)
}
