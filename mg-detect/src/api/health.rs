//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;

/// Configuration state of one provider
#[derive(Debug, Serialize)]
pub struct ProviderHealth {
    pub configured: bool,
    /// "ready" or "not_configured"
    pub status: &'static str,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("mg-detect")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git hash the binary was built from
    pub build: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Provider id → configuration state
    pub providers: BTreeMap<String, ProviderHealth>,
    /// Assessments held in the result store
    pub total_analyses: usize,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let providers = state
        .service
        .provider_status()
        .into_iter()
        .map(|entry| {
            let health = ProviderHealth {
                configured: entry.configured,
                status: if entry.configured {
                    "ready"
                } else {
                    "not_configured"
                },
            };
            (entry.provider, health)
        })
        .collect();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "mg-detect".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("MG_GIT_HASH").to_string(),
        uptime_seconds,
        providers,
        total_analyses: state.service.total_analyses().await,
    })
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub message: String,
}

/// GET /ping
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "MediaGuard detection API is running".to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/ping", get(ping))
}
