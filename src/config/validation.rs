//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! All problems are reported at once rather than stopping at the first.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("timeouts.upstream_secs ({upstream}) must be less than timeouts.request_secs ({request})")]
    UpstreamOutlastsRequest { upstream: u64, request: u64 },

    #[error("observability.log_format: unknown format '{0}' (expected 'pretty' or 'json')")]
    UnknownLogFormat(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.upstream_secs"));
    }
    // Otherwise the request timeout answers 408 before a slow fetch can fail as 502.
    if config.timeouts.request_secs > 0 && config.timeouts.upstream_secs >= config.timeouts.request_secs {
        errors.push(ValidationError::UpstreamOutlastsRequest {
            upstream: config.timeouts.upstream_secs,
            request: config.timeouts.request_secs,
        });
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.window_secs == 0 {
            errors.push(ValidationError::Zero("rate_limit.window_secs"));
        }
        if rl.max_requests == 0 {
            errors.push(ValidationError::Zero("rate_limit.max_requests"));
        }
        if rl.cleanup_interval_secs == 0 {
            errors.push(ValidationError::Zero("rate_limit.cleanup_interval_secs"));
        }
    }

    let obs = &config.observability;
    if !matches!(obs.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::UnknownLogFormat(obs.log_format.clone()));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: obs.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
