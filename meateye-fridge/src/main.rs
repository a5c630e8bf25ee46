//! meateye-fridge - Fridge lifecycle and expiry notification service
//!
//! Stores recognized meat cuts, schedules expiry alerts and delivers them
//! through a push relay from a background sweep.

use anyhow::{Context, Result};
use clap::Parser;
use meateye_common::events::EventBus;
use meateye_common::SystemClock;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meateye_fridge::config::Cli;
use meateye_fridge::services::{spawn_sweep_loop, HttpPushRelay, TraceabilityClient};
use meateye_fridge::{AppState, FridgeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,meateye_fridge=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting meateye-fridge v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();

    let toml_config = meateye_common::config::load_toml_config(cli.config.as_deref())
        .context("Failed to load configuration file")?;
    let config = FridgeConfig::load(&cli, toml_config.as_ref()).context("Invalid configuration")?;

    let root_folder =
        meateye_common::config::resolve_root_folder(cli.root_folder.as_deref(), toml_config.as_ref());
    let db_path = meateye_common::config::prepare_database_path(&root_folder)
        .context("Failed to prepare root folder")?;
    info!("Database: {}", db_path.display());

    let db_pool = meateye_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let lookup = Arc::new(
        TraceabilityClient::new(
            &config.traceability_api_url,
            &config.traceability_api_key,
            config.traceability_timeout(),
        )
        .context("Failed to build traceability client")?,
    );
    let relay_url = Some(config.push_relay_url.clone()).filter(|url| !url.is_empty());
    let gateway = Arc::new(
        HttpPushRelay::new(relay_url, config.push_timeout()).context("Failed to build push relay client")?,
    );

    let state = AppState::new(
        db_pool,
        EventBus::default(),
        Arc::new(SystemClock),
        lookup,
        gateway,
        &config,
    );

    let cancel = CancellationToken::new();
    let sweep_handle = spawn_sweep_loop(state.scheduler.clone(), config.sweep_interval(), cancel.clone());

    let app = meateye_fridge::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    sweep_handle.await.context("Sweep loop panicked")?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
