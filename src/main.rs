//! meridian-vault server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints and the
//! keeper loops.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use meridian_vault::api;
use meridian_vault::app_state::AppState;
use meridian_vault::config::{LogFormat, VaultConfig};
use meridian_vault::engine::HealthMonitor;
use meridian_vault::persistence::PostgresPersistence;
use meridian_vault::service::{Keeper, KeeperSchedule, bootstrap};
use meridian_vault::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = VaultConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting meridian-vault");

    // Persistence
    let persistence = if config.persistence_enabled {
        let persistence = PostgresPersistence::connect(&config)
            .await
            .context("connecting to PostgreSQL")?;
        persistence.migrate().await.context("running migrations")?;
        Some(persistence)
    } else {
        tracing::info!("persistence disabled, ledger state is in-memory only");
        None
    };

    // Build service layer
    let vault_service = Arc::new(
        bootstrap(&config, persistence)
            .await
            .context("bootstrapping ledger")?,
    );
    let monitor = HealthMonitor::new(config.keeper_address, config.health);

    // Keeper
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let keeper = Keeper::new(
        Arc::clone(&vault_service),
        monitor.clone(),
        KeeperSchedule::from_config(&config),
    );
    let keeper_task = tokio::spawn(keeper.run(shutdown_rx));

    // Build application state
    let app_state = AppState::new(vault_service, monitor);

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(());
    if let Err(e) = keeper_task.await {
        tracing::error!(error = %e, "keeper task failed");
    }

    Ok(())
}
