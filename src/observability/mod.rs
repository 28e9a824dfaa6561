//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Admission, validation and fetch stages produce:
//!     → logging.rs (structured tracing events, request ID on each)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
