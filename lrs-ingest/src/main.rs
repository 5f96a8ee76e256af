//! lrs-ingest - Learning Record Ingestion Service
//!
//! **Module Identity:**
//! - Name: lrs-ingest
//! - Default port: 5740
//!
//! Accepts learning-activity statements, stores them append-only, and keeps
//! one derived progress record per (learner, course) current by
//! recomputing it after every accepted statement.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lrs_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use lrs_common::events::EventBus;
use lrs_ingest::config::RuntimeSettings;
use lrs_ingest::{build_router, AppState};

/// Command-line arguments for lrs-ingest
#[derive(Parser, Debug)]
#[command(name = "lrs-ingest")]
#[command(about = "Learning record ingestion and progress materialization")]
#[command(version)]
struct Args {
    /// Root folder holding the database (LRS_ROOT_FOLDER is checked next)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML config file
    #[arg(short, long, env = "LRS_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "LRS_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides TOML)
    #[arg(short, long, env = "LRS_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_or_default(args.config.as_deref());

    // RUST_LOG wins over the TOML level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},tower_http=info", toml_config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting lrs-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder)
        .with_toml(&toml_config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path(&toml_config.database_file);
    info!("Database: {}", db_path.display());

    let db = lrs_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let settings = RuntimeSettings::load(&db)
        .await
        .context("Failed to load runtime settings")?;

    let event_bus = EventBus::new(toml_config.event_bus_capacity.max(1));
    let state = AppState::new(db.clone(), event_bus, settings);
    let app = build_router(state);

    let bind = args.bind.unwrap_or(toml_config.bind_address);
    let port = args.port.unwrap_or(toml_config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
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
                warn!("SIGTERM handler unavailable: {}", e);
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

    info!("Shutdown signal received");
}
