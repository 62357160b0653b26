//! lms-pay - payment confirmation dialog service
//!
//! Serves the borrow/extend payment dialogs over HTTP + SSE, talking to the
//! library backend and its realtime payment hub.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lms_common::config::{ConfigResolver, TomlConfig};
use lms_pay::{build_router, AppState};

/// Command-line arguments for lms-pay
#[derive(Parser, Debug)]
#[command(name = "lms-pay")]
#[command(about = "Payment confirmation service for digital borrows")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "LMS_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "LMS_PAY_PORT")]
    port: Option<u16>,

    /// Library backend base URL (overrides config)
    #[arg(short, long, env = "LMS_BACKEND_URL")]
    backend_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args, std::io::stderr)?;
    init_tracing(&config)?;

    info!(
        "Starting LMS payment service (lms-pay) v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Backend: {}", config.backend_url);
    info!("Payment hub: {}/{}", config.hub_base_url(), config.hub.path);

    let state = AppState::new(&config).context("Failed to initialize service")?;
    let dialogs = state.dialogs.clone();
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("lms-pay listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let closed = dialogs.close_all("shutdown").await;
    info!(closed_dialogs = closed, "Server shutdown complete");
    Ok(())
}

/// Resolve config file, then apply CLI overrides
///
/// Runs under a console-only subscriber writing to `writer`, since the
/// configured logging is not known yet.
fn load_config<W>(args: &Args, writer: W) -> Result<TomlConfig>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(writer)
        .finish();

    tracing::subscriber::with_default(bootstrap, || {
        let mut config = ConfigResolver::new("lms-pay")
            .resolve(args.config.as_deref())
            .context("Failed to load configuration")?;
        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(backend_url) = &args.backend_url {
            config.backend_url = backend_url.clone();
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    })
}

/// Console logging plus an optional log file
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let level = &config.logging.level;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("lms_pay={level},lms_common={level},tower_http={level}").into()
    });

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
