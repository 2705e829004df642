//! mg-detect - MediaGuard detection API server
//!
//! Accepts media uploads over HTTP, fans them out to the configured detection
//! providers and returns a fused risk assessment.

use anyhow::{Context, Result};
use clap::Parser;
use mg_common::config::{write_toml_config, ConfigResolver, TomlConfig};
use mg_detect::{build_router, AppState, DetectionService};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "mg-detect", version, about = "MediaGuard detection API server")]
struct Args {
    /// Path to TOML config file (overrides MEDIAGUARD_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Write a config file with default values to the resolved path and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting MediaGuard detection API (mg-detect) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("MG_GIT_HASH"),
        env!("MG_BUILD_TIMESTAMP"),
        env!("MG_BUILD_PROFILE")
    );

    if args.init_config {
        let path = resolver
            .resolve_path()
            .or_else(mg_common::config::default_config_path)
            .context("No config path available (pass --config)")?;
        write_toml_config(&TomlConfig::default(), &path)?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    match resolver.resolve_path() {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("Config file: none (compiled defaults)"),
    }

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let service = DetectionService::from_config(&config)?;

    let configured: Vec<String> = service
        .provider_status()
        .into_iter()
        .filter(|p| p.configured)
        .map(|p| p.provider)
        .collect();
    if configured.is_empty() {
        warn!("No detection providers configured; every analysis will report low risk");
    } else {
        info!("Configured providers: {}", configured.join(", "));
    }
    info!(
        profile = %service.policy().profile,
        max_file_size = service.max_file_size(),
        provider_timeout_secs = config.dispatch.provider_timeout().as_secs(),
        "Detection service ready"
    );

    if config.rate_limit.trust_forwarded_for {
        warn!("Rate limiting by X-Forwarded-For; only safe behind a trusted reverse proxy");
    }

    let state =
        AppState::new(service).with_trust_forwarded_for(config.rate_limit.trust_forwarded_for);
    let app = build_router(state, &config.cors_origins);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("mg-detect listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
