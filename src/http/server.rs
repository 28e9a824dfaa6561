//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the proxy handler on every path
//! - Wire up middleware (request ID, tracing, CORS, timeout, admission)
//! - Run the validation → fetch → relay pipeline per request
//! - Sweep expired rate-limit windows in the background
//!
//! # Layer Order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → CORS → Timeout → Admission → handler
//! ```
//! CORS sits outside admission so 429 responses are readable cross-origin.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::{relay, Outcome, ProxyError};
use crate::lifecycle::shutdown_signal;
use crate::observability::metrics;
use crate::security::rate_limit::{rate_limit_middleware, AdmissionState, MemoryRateLimiter};
use crate::security::target::{target_param, validate_target};
use crate::upstream::{HttpUpstream, Upstream};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn Upstream>,
}

/// HTTP server for the cover proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    limiter: Option<Arc<MemoryRateLimiter>>,
}

impl HttpServer {
    /// Create a server fetching through a real HTTP client.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let upstream = HttpUpstream::new(Duration::from_secs(config.timeouts.upstream_secs))?;
        Ok(Self::with_upstream(config, Arc::new(upstream)))
    }

    /// Create a server fetching through the given upstream.
    pub fn with_upstream(config: ProxyConfig, upstream: Arc<dyn Upstream>) -> Self {
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(MemoryRateLimiter::from_config(&config.rate_limit)));

        let router = Self::build_router(&config, AppState { upstream }, limiter.clone());
        Self {
            router,
            config,
            limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ProxyConfig,
        state: AppState,
        limiter: Option<Arc<MemoryRateLimiter>>,
    ) -> Router {
        let mut router = Router::new()
            .route("/", get(proxy_handler))
            .route("/{*path}", get(proxy_handler))
            .with_state(state);

        if let Some(limiter) = limiter {
            let admission = AdmissionState {
                control: limiter,
                trusted_proxy_hops: config.rate_limit.trusted_proxy_hops,
            };
            router = router.layer(middleware::from_fn_with_state(admission, rate_limit_middleware));
        }

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::HEAD]);

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(cors)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for serving on a custom transport.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires or the process is signalled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = self.limiter.clone().map(|limiter| {
            spawn_sweeper(limiter, Duration::from_secs(self.config.rate_limit.cleanup_interval_secs))
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => {},
                    _ = shutdown_signal() => {},
                }
            })
            .await?;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn spawn_sweeper(limiter: Arc<MemoryRateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = limiter.purge_expired(std::time::Instant::now());
            if removed > 0 {
                tracing::debug!(
                    removed,
                    tracked = limiter.tracked_clients(),
                    "Purged expired rate-limit windows"
                );
            }
        }
    })
}

/// Main proxy handler.
/// Validates the `url` parameter, fetches it, and relays the answer.
async fn proxy_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers);

    let (response, outcome) = match proxy(&state, uri.query(), &request_id).await {
        Ok(response) => (response, Outcome::Relayed),
        Err(e) => {
            log_failure(&request_id, &e);
            let outcome = e.outcome();
            (e.into_response(), outcome)
        }
    };

    metrics::record_request(response.status().as_u16(), outcome.as_str(), start_time);
    response
}

async fn proxy(state: &AppState, query: Option<&str>, request_id: &str) -> Result<Response, ProxyError> {
    let raw = target_param(query);
    let target = validate_target(raw.as_deref())?;

    tracing::debug!(request_id = %request_id, target = %target, "Fetching upstream");

    let fetch_start = Instant::now();
    let upstream = state.upstream.fetch(&target).await;
    metrics::record_upstream_fetch(target.host_str().unwrap_or_default(), fetch_start);

    let upstream = upstream?;
    tracing::debug!(
        request_id = %request_id,
        status = %upstream.status,
        bytes = upstream.body.len(),
        "Upstream answered"
    );
    relay(upstream)
}

fn log_failure(request_id: &str, err: &ProxyError) {
    match err {
        ProxyError::Target(e) if e.is_policy() => {
            tracing::warn!(request_id = %request_id, reason = %e, "Target rejected by allow-list");
        }
        ProxyError::Target(e) => {
            tracing::debug!(request_id = %request_id, reason = %e, "Invalid target");
        }
        ProxyError::UpstreamStatus { status, reason } => {
            tracing::info!(
                request_id = %request_id,
                status = %status,
                reason = %reason,
                "Upstream returned error status"
            );
        }
        ProxyError::Fetch(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream fetch failed");
        }
    }
}
