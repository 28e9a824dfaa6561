//! Cover image proxy library.
//!
//! Fetches images from a fixed allow-list of cover hosts on behalf of
//! browsers, relaying them with permissive CORS and a one-hour cache hint.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
