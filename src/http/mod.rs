//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → request.rs (request ID)
//!     → security (admission, target validation)
//!     → upstream (fetch)
//!     → response.rs (relay or error mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{Outcome, ProxyError};
pub use server::{AppState, HttpServer};
