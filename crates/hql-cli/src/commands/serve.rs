//! Serve command implementation.

use super::load_metastore;
use crate::server::{start_server, ServerState};
use crate::ExitCode;
use anyhow::Result;
use hql_core::health::{HealthCheck, METASTORE_COMPONENT, PLANNER_COMPONENT};
use hql_core::metrics::PlannerMetrics;
use hql_core::Config;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Run the metastore service until SIGINT or SIGTERM.
pub async fn run(config: Config, schema: Option<&Path>) -> Result<ExitCode> {
    info!(
        address = %config.metastore.bind_address,
        port = config.metastore.port,
        warehouse = %config.metastore.warehouse_dir,
        "Starting metastore service"
    );

    let health = Arc::new(HealthCheck::for_service());
    let metrics = Arc::new(PlannerMetrics::new()?);
    let metastore = match load_metastore(&config, schema) {
        Ok(metastore) => metastore,
        Err(e) => {
            health.mark_unhealthy(METASTORE_COMPONENT, &e.to_string());
            return Err(e);
        }
    };
    health.mark_healthy(METASTORE_COMPONENT);
    // Planning is in process and stateless
    health.mark_healthy(PLANNER_COMPONENT);

    let state = Arc::new(ServerState {
        health: Arc::clone(&health),
        metrics,
        metastore: Arc::new(metastore),
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server = tokio::spawn({
        let bind_address = config.metastore.bind_address.clone();
        let metastore_port = config.metastore.port;
        let metrics_port = config.monitoring.metrics_port;
        async move {
            start_server(state, &bind_address, metastore_port, metrics_port, shutdown_rx).await
        }
    });

    let exit_code = tokio::select! {
        code = wait_for_signal() => code,
        result = server => {
            // The server stopped on its own, e.g. a failed bind
            result??;
            return Ok(ExitCode::Success);
        }
    };

    let _ = shutdown_tx.send(());
    info!("Metastore service stopped");
    Ok(exit_code)
}

async fn wait_for_signal() -> ExitCode {
    #[cfg(unix)]
    {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return ExitCode::SignalInterrupt;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                ExitCode::SignalInterrupt
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
                ExitCode::Success
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, initiating graceful shutdown");
        ExitCode::SignalInterrupt
    }
}
