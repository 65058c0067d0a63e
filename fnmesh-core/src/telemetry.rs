use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Initialise the global `tracing` subscriber.
///
/// Respects `RUST_LOG`, falling back to `LOG_LEVEL` from [`crate::FnMeshConfig`]
/// when `RUST_LOG` isn't set. Call once, at the very start of `main`.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{log_level},tower_http=debug").parse().expect("valid env filter")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Permissive CORS layer, suitable for the dispatch surface fronting containers
/// that may be invoked from arbitrary origins.
pub fn default_cors() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

/// Standard request/response tracing layer.
pub fn default_trace() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
