//! slt-survey - Subjective Listening Test web service
//!
//! Serves a multi-section listening test, collects per-item judgments into
//! in-memory sessions and appends complete submissions to the configured
//! row sink (SQLite by default, Google Sheets optionally).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use slt_common::config::{resolve_config_path, SurveyConfig, CONFIG_ENV_VAR};
use slt_common::Catalog;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slt_survey::media::HttpFetcher;
use slt_survey::sessions::SessionRegistry;
use slt_survey::sinks::build_sink;
use slt_survey::{build_router, AppState};

/// How often idle sessions are looked for
const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Command-line arguments for slt-survey
#[derive(Parser, Debug)]
#[command(name = "slt-survey")]
#[command(about = "Subjective listening test survey service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config file)
    #[arg(short, long, env = "SLT_BIND_ADDR")]
    bind: Option<String>,

    /// Catalog file (overrides config file)
    #[arg(long, env = "SLT_CATALOG")]
    catalog: Option<PathBuf>,

    /// Skip warming the media cache at startup
    #[arg(long)]
    no_prefetch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slt_survey=info,slt_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting slt-survey v{}", env!("CARGO_PKG_VERSION"));

    // Config file: CLI > ENV > user config > compiled defaults
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config = SurveyConfig::load(config_path.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(catalog) = args.catalog {
        config.catalog_path = Some(catalog);
    }

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => {
            info!("No catalog configured, using built-in same-speaker test");
            Catalog::builtin()
        }
    };
    info!(
        sections = catalog.sections().len(),
        items = catalog.item_count(),
        "Catalog ready"
    );

    let timeout = Duration::from_secs(config.media_timeout_secs);
    let sink = build_sink(&config.sink, timeout).await?;
    let fetcher = Arc::new(HttpFetcher::new(timeout).context("Failed to create HTTP client")?);

    let sessions = SessionRegistry::with_capacity(config.max_sessions);
    let state = AppState::new(catalog, sink, fetcher).with_sessions(sessions.clone());

    let idle = Duration::from_secs(config.session_idle_secs);
    info!(
        idle_secs = config.session_idle_secs,
        max_sessions = config.max_sessions,
        "Idle sessions will be discarded"
    );
    let period = SESSION_SWEEP_PERIOD.min(idle).max(Duration::from_secs(1));
    tokio::spawn(sessions.run_idle_sweep(idle, period));

    if !args.no_prefetch {
        let media = state.media.clone();
        let catalog = Arc::clone(&state.catalog);
        tokio::spawn(async move {
            media.prefetch_catalog(&catalog).await;
        });
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("slt-survey listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, in-memory sessions will be discarded");
}
