// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use beacon_core::BeaconError;
use beacon_engine::{Engine, Ingestor};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<Engine>,
    /// Submission handle of the running engine.
    pub ingestor: Ingestor,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token for the `/v1` routes. `None` rejects every request.
    pub bearer_token: Option<String>,
}

/// Build the full route table.
///
/// `GET /health` is public; everything under `/v1` requires the bearer
/// token.
pub fn router(state: GatewayState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/messages", post(handlers::post_messages))
        .route(
            "/v1/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/v1/categories/{id}", get(handlers::get_category))
        .route("/v1/categories/{id}/approve", post(handlers::approve_category))
        .route("/v1/categories/{id}/reject", post(handlers::reject_category))
        .route("/v1/categories/{id}/merge", post(handlers::merge_category))
        .route("/v1/categories/{id}/threshold", put(handlers::put_threshold))
        .route("/v1/categories/{id}/history", get(handlers::category_history))
        .route(
            "/v1/rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route(
            "/v1/rules/{id}",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        .route(
            "/v1/destinations",
            get(handlers::list_destinations).post(handlers::create_destination),
        )
        .route(
            "/v1/destinations/{id}",
            put(handlers::update_destination).delete(handlers::delete_destination),
        )
        .route(
            "/v1/settings/severity-bands",
            get(handlers::get_severity_bands).put(handlers::put_severity_bands),
        )
        .route("/v1/routing-log", get(handlers::routing_log))
        .route("/v1/routing-log/stats", get(handlers::routing_stats))
        .route("/v1/stats/messages", get(handlers::message_stats))
        .route("/v1/senders/{id}", get(handlers::get_sender))
        .route(
            "/v1/senders/{id}/false-positive",
            post(handlers::mark_false_positive),
        )
        .route("/v1/detector/run", post(handlers::run_detector))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), BeaconError> {
    if config.bearer_token.as_deref().is_none_or(str::is_empty) {
        tracing::warn!("gateway has no bearer token; every /v1 request will be rejected");
    }
    let app = router(
        state,
        AuthConfig {
            bearer_token: config.bearer_token.clone(),
        },
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BeaconError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| BeaconError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
