//! mg-detect library interface
//!
//! MediaGuard's detection aggregation engine: uploaded media goes out to every
//! registered detection provider at once, and the provider reports are fused into one
//! risk assessment.

pub mod api;
pub mod dispatcher;
pub mod error;
pub mod fusion;
pub mod intake;
pub mod providers;
pub mod service;
pub mod store;
pub mod types;

pub use crate::error::{ApiError, ApiResult};
pub use crate::service::DetectionService;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Multipart framing allowance on top of the file size ceiling
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DetectionService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Rate-limit clients by `X-Forwarded-For` rather than the peer address
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(service: DetectionService) -> Self {
        Self {
            service: Arc::new(service),
            startup_time: Utc::now(),
            trust_forwarded_for: false,
        }
    }

    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

/// CORS policy for the configured origins (`"*"` allows any origin)
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(allowed)
}

/// Build application router
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let body_limit = state.service.max_file_size().saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .merge(api::analysis_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
