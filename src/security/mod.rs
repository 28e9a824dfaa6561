//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (derive client IP through trusted proxy hops)
//!     → rate_limit.rs (per-client admission)
//!     → target.rs (validate `url`, enforce host allow-list)
//!     → Pass to upstream fetch
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any check failure
//! - No trust in client input beyond the configured proxy hops
//! - Rejections never explain why a host was refused

pub mod headers;
pub mod rate_limit;
pub mod target;

pub use rate_limit::{Admission, AdmissionControl, MemoryRateLimiter};
pub use target::{validate_target, TargetError, ALLOWED_HOSTS};
