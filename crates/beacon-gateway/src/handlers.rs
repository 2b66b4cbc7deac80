// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for ingestion and administration.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use beacon_core::{
    Category, CategoryId, CategoryStatus, DestinationGroup, InboundMessage, RoutingRule,
    RuleDraft, RuleId, SenderProfile, SeverityBands,
};
use beacon_detect::RunOutcome;
use beacon_engine::{CategoryDraft, ComponentHealth, MessageStats};
use beacon_storage::{CategoryTransition, DestinationStats, LogFilter, LogPage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Largest routing-log page a client may request.
pub const MAX_PAGE_SIZE: i64 = 500;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Response body for POST /v1/messages.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub id: String,
    pub received_at: DateTime<Utc>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub status: Option<CategoryStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ApproverBody {
    pub approver: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeBody {
    pub target_id: CategoryId,
    pub approver: String,
}

/// Threshold on the dashboard's 0-100 scale.
#[derive(Debug, Deserialize)]
pub struct ThresholdBody {
    pub percent: f64,
}

#[derive(Debug, Deserialize)]
pub struct DestinationBody {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct DestinationUpdate {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Routing-log filters and paging from the query string.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub digest_type: Option<String>,
    pub category_id: Option<CategoryId>,
    pub destination_group_id: Option<String>,
    pub success: Option<bool>,
    pub message_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl LogQuery {
    fn filter(&self) -> LogFilter {
        LogFilter {
            digest_type: self.digest_type.clone(),
            category_id: self.category_id,
            destination_group_id: self.destination_group_id.clone(),
            success: self.success,
            message_id: self.message_id.clone(),
            from: self.from,
            to: self.to,
        }
    }

    fn page(&self) -> (i64, i64) {
        (
            self.limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE),
            self.offset.unwrap_or(0).max(0),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub since: Option<DateTime<Utc>>,
}

// --- Health ---

/// GET /health (unauthenticated)
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let components = state.engine.health().await;
    let status = if components.iter().any(|c| c.status == "unhealthy") {
        "unhealthy"
    } else if components.iter().all(ComponentHealth::is_healthy) {
        "ok"
    } else {
        "degraded"
    };
    let code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: state.start_time.elapsed().as_secs(),
            components,
        }),
    )
        .into_response()
}

// --- Ingestion ---

/// POST /v1/messages
///
/// Persists and queues the message; processing happens asynchronously.
pub async fn post_messages(
    State(state): State<GatewayState>,
    Json(body): Json<InboundMessage>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let message = state.ingestor.submit(body).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            id: message.id,
            received_at: message.received_at,
        }),
    ))
}

// --- Categories ---

pub async fn list_categories(
    State(state): State<GatewayState>,
    Query(q): Query<CategoryQuery>,
) -> ApiResult<Vec<Category>> {
    Ok(Json(state.engine.admin().list_categories(q.status).await?))
}

pub async fn create_category(
    State(state): State<GatewayState>,
    Json(draft): Json<CategoryDraft>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.engine.admin().create_category(draft).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<GatewayState>,
    Path(id): Path<CategoryId>,
) -> ApiResult<Category> {
    Ok(Json(state.engine.admin().get_category(id).await?))
}

pub async fn approve_category(
    State(state): State<GatewayState>,
    Path(id): Path<CategoryId>,
    Json(body): Json<ApproverBody>,
) -> ApiResult<Category> {
    Ok(Json(
        state
            .engine
            .admin()
            .approve_category(id, &body.approver)
            .await?,
    ))
}

pub async fn reject_category(
    State(state): State<GatewayState>,
    Path(id): Path<CategoryId>,
    Json(body): Json<ApproverBody>,
) -> ApiResult<Category> {
    Ok(Json(
        state
            .engine
            .admin()
            .reject_category(id, &body.approver)
            .await?,
    ))
}

pub async fn merge_category(
    State(state): State<GatewayState>,
    Path(id): Path<CategoryId>,
    Json(body): Json<MergeBody>,
) -> ApiResult<Category> {
    Ok(Json(
        state
            .engine
            .admin()
            .merge_category(id, body.target_id, &body.approver)
            .await?,
    ))
}

pub async fn put_threshold(
    State(state): State<GatewayState>,
    Path(id): Path<CategoryId>,
    Json(body): Json<ThresholdBody>,
) -> ApiResult<Category> {
    Ok(Json(
        state
            .engine
            .admin()
            .set_category_threshold(id, body.percent)
            .await?,
    ))
}

pub async fn category_history(
    State(state): State<GatewayState>,
    Path(id): Path<CategoryId>,
) -> ApiResult<Vec<CategoryTransition>> {
    Ok(Json(state.engine.admin().category_history(id).await?))
}

// --- Rules ---

pub async fn list_rules(State(state): State<GatewayState>) -> ApiResult<Vec<RoutingRule>> {
    Ok(Json(state.engine.admin().list_rules().await?))
}

pub async fn create_rule(
    State(state): State<GatewayState>,
    Json(draft): Json<RuleDraft>,
) -> Result<(StatusCode, Json<RoutingRule>), ApiError> {
    let rule = state.engine.admin().create_rule(draft).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn get_rule(
    State(state): State<GatewayState>,
    Path(id): Path<RuleId>,
) -> ApiResult<RoutingRule> {
    Ok(Json(state.engine.admin().get_rule(id).await?))
}

pub async fn update_rule(
    State(state): State<GatewayState>,
    Path(id): Path<RuleId>,
    Json(draft): Json<RuleDraft>,
) -> ApiResult<RoutingRule> {
    Ok(Json(state.engine.admin().update_rule(id, draft).await?))
}

pub async fn delete_rule(
    State(state): State<GatewayState>,
    Path(id): Path<RuleId>,
) -> Result<StatusCode, ApiError> {
    state.engine.admin().delete_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Destinations ---

pub async fn list_destinations(
    State(state): State<GatewayState>,
) -> ApiResult<Vec<DestinationGroup>> {
    Ok(Json(state.engine.admin().list_destinations().await?))
}

pub async fn create_destination(
    State(state): State<GatewayState>,
    Json(body): Json<DestinationBody>,
) -> Result<(StatusCode, Json<DestinationGroup>), ApiError> {
    let saved = state
        .engine
        .admin()
        .put_destination(DestinationGroup {
            id: body.id,
            name: body.name,
            is_active: body.is_active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update_destination(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<DestinationUpdate>,
) -> ApiResult<DestinationGroup> {
    let admin = state.engine.admin();
    let current = admin.get_destination(&id).await?;
    let saved = admin
        .put_destination(DestinationGroup {
            id: current.id,
            name: body.name,
            is_active: body.is_active,
        })
        .await?;
    Ok(Json(saved))
}

pub async fn delete_destination(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine.admin().delete_destination(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Settings ---

pub async fn get_severity_bands(State(state): State<GatewayState>) -> Json<SeverityBands> {
    Json(state.engine.admin().severity_bands())
}

pub async fn put_severity_bands(
    State(state): State<GatewayState>,
    Json(bands): Json<SeverityBands>,
) -> ApiResult<SeverityBands> {
    Ok(Json(state.engine.admin().set_severity_bands(bands).await?))
}

// --- Routing log and stats ---

pub async fn routing_log(
    State(state): State<GatewayState>,
    Query(q): Query<LogQuery>,
) -> ApiResult<LogPage> {
    let (limit, offset) = q.page();
    Ok(Json(
        state
            .engine
            .admin()
            .routing_log(&q.filter(), limit, offset)
            .await?,
    ))
}

pub async fn routing_stats(
    State(state): State<GatewayState>,
    Query(q): Query<LogQuery>,
) -> ApiResult<Vec<DestinationStats>> {
    Ok(Json(state.engine.admin().routing_stats(&q.filter()).await?))
}

pub async fn message_stats(
    State(state): State<GatewayState>,
    Query(q): Query<StatsQuery>,
) -> ApiResult<MessageStats> {
    Ok(Json(state.engine.admin().message_stats(q.since).await?))
}

// --- Senders ---

pub async fn get_sender(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<SenderProfile> {
    Ok(Json(state.engine.admin().sender_profile(&id).await?))
}

pub async fn mark_false_positive(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<SenderProfile> {
    Ok(Json(state.engine.admin().mark_false_positive(&id).await?))
}

// --- Detector ---

/// POST /v1/detector/run
///
/// Reports `skipped` when a pass is already running.
pub async fn run_detector(State(state): State<GatewayState>) -> ApiResult<RunOutcome> {
    Ok(Json(state.engine.admin().run_detection_now().await?))
}
