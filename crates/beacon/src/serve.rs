// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `beacon serve` command implementation.
//!
//! Builds the engine from configuration, replays unfinished messages,
//! starts the background schedules and the HTTP gateway, and runs until
//! SIGINT or SIGTERM. In-flight deliveries observe the shutdown and record
//! a cancelled outcome before the process exits.

use std::sync::Arc;

use beacon_config::model::BeaconConfig;
use beacon_core::BeaconError;
use beacon_engine::{Engine, metrics, shutdown};
use tracing::{error, info};

pub async fn run_serve(config: BeaconConfig) -> Result<(), BeaconError> {
    crate::init_tracing(&config.engine.log_level);
    metrics::register_metrics();

    info!(
        name = %config.engine.name,
        database = %config.storage.database_path,
        "starting beacon serve"
    );

    #[cfg(feature = "gateway")]
    let gateway_config = config.gateway.clone();

    let engine = Arc::new(Engine::from_config(config).await?);
    let seeded = engine.seeded();
    if seeded.categories_added > 0 || seeded.destinations_added > 0 {
        info!(
            categories = seeded.categories_added,
            destinations = seeded.destinations_added,
            "seeded new configuration entries"
        );
    }

    let cancel = shutdown::install_signal_handler();
    let running = engine.start(cancel.clone()).await?;
    if running.recovered() > 0 {
        info!(count = running.recovered(), "recovering unfinished messages");
    }

    #[cfg(feature = "gateway")]
    let gateway = if gateway_config.enabled {
        let state = beacon_gateway::GatewayState {
            engine: Arc::clone(&engine),
            ingestor: running.ingestor().clone(),
            start_time: std::time::Instant::now(),
        };
        let server_config = beacon_gateway::ServerConfig {
            host: gateway_config.host.clone(),
            port: gateway_config.port,
            bearer_token: gateway_config.bearer_token.clone(),
        };
        let token = cancel.clone();
        Some(tokio::spawn(async move {
            let result = beacon_gateway::start_server(&server_config, state, token.clone()).await;
            if let Err(e) = &result {
                error!(error = %e, "gateway failed, shutting down");
                token.cancel();
            }
            result
        }))
    } else {
        info!("gateway disabled");
        None
    };

    cancel.cancelled().await;
    info!("shutdown requested, draining in-flight work");
    running.join().await;

    #[cfg(feature = "gateway")]
    if let Some(handle) = gateway {
        match handle.await {
            Ok(result) => result?,
            Err(e) => return Err(BeaconError::Internal(format!("gateway task failed: {e}"))),
        }
    }

    engine.db().clone().close().await?;
    info!("beacon stopped");
    Ok(())
}
