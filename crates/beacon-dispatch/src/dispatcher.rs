// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of routing decisions through the chat transport.
//!
//! Every call to [`Dispatcher::deliver`] that reaches the transport ends in
//! exactly one routing log entry, whatever the outcome. A decision already
//! delivered for the same message, rule, and destination is skipped without
//! a new entry.

use std::sync::Arc;
use std::time::Duration;

use beacon_config::model::DispatchConfig;
use beacon_core::{
    BeaconError, ClassificationResult, Message, RoutingDecision, RoutingLogEntry, SendError,
    TransportAdapter,
};
use beacon_storage::Database;
use beacon_storage::queries::routing_log;
use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::AuditLog;
use crate::ratelimit::DestinationLimiter;

/// Error text recorded when shutdown interrupts a delivery.
pub const CANCELLED: &str = "cancelled";

/// Retry and timeout budget for one delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub send_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(cfg: &DispatchConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_backoff: Duration::from_millis(cfg.base_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            send_timeout: Duration::from_millis(cfg.send_timeout_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base doubled per retry, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// How one decision ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// A success was already on record; nothing was sent.
    AlreadyDelivered,
    Failed { error: String, permanent: bool },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub decision: RoutingDecision,
    pub status: DeliveryStatus,
    pub attempts: u32,
    /// Routing log entry written for this delivery, if any.
    pub entry_id: Option<String>,
}

impl DeliveryOutcome {
    /// Whether the alert reached (or had already reached) its destination.
    pub fn succeeded(&self) -> bool {
        matches!(
            self.status,
            DeliveryStatus::Delivered | DeliveryStatus::AlreadyDelivered
        )
    }
}

/// Message-level context copied into every log entry.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryContext<'a> {
    pub message: &'a Message,
    pub classification: &'a ClassificationResult,
    pub escalation_score: f64,
}

/// One decision paired with its rendered alert text.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub decision: RoutingDecision,
    pub text: String,
}

pub struct Dispatcher {
    transport: Arc<dyn TransportAdapter>,
    limiter: DestinationLimiter,
    audit: AuditLog,
    db: Database,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn TransportAdapter>,
        limiter: DestinationLimiter,
        audit: AuditLog,
        db: Database,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            limiter,
            audit,
            db,
            policy,
        }
    }

    pub fn transport(&self) -> &Arc<dyn TransportAdapter> {
        &self.transport
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Deliver all `deliveries` concurrently.
    ///
    /// Each decision succeeds or fails on its own. The first audit write
    /// failure, if any, is returned once every delivery has finished.
    pub async fn deliver_all(
        &self,
        deliveries: Vec<Delivery>,
        ctx: DeliveryContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeliveryOutcome>, BeaconError> {
        let results = join_all(
            deliveries
                .iter()
                .map(|d| self.deliver(&d.decision, ctx, &d.text, cancel)),
        )
        .await;
        results.into_iter().collect()
    }

    /// Deliver one decision, retrying transient failures.
    ///
    /// Only an audit write failure is returned as an error; transport
    /// failures are recorded and reported through [`DeliveryStatus`].
    pub async fn deliver(
        &self,
        decision: &RoutingDecision,
        ctx: DeliveryContext<'_>,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<DeliveryOutcome, BeaconError> {
        let destination = decision.destination_group_id.as_str();
        match routing_log::has_success(
            &self.db,
            &ctx.message.id,
            Some(decision.rule_id),
            destination,
        )
        .await
        {
            Ok(true) => {
                debug!(
                    message_id = %ctx.message.id,
                    rule_id = decision.rule_id,
                    destination,
                    "already delivered, skipping"
                );
                metrics::counter!("beacon_deliveries_total", "result" => "duplicate").increment(1);
                return Ok(DeliveryOutcome {
                    decision: decision.clone(),
                    status: DeliveryStatus::AlreadyDelivered,
                    attempts: 0,
                    entry_id: None,
                });
            }
            Ok(false) => {}
            Err(e) => {
                warn!(message_id = %ctx.message.id, error = %e, "duplicate check failed, sending anyway");
            }
        }

        let (status, attempts) = self.attempt(destination, text, cancel).await;

        let (success, error_message) = match &status {
            DeliveryStatus::Delivered => (true, None),
            DeliveryStatus::Failed { error, .. } => (false, Some(error.clone())),
            DeliveryStatus::Cancelled => (false, Some(CANCELLED.to_string())),
            DeliveryStatus::AlreadyDelivered => (true, None),
        };
        let entry = RoutingLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            message_id: ctx.message.id.clone(),
            rule_id: Some(decision.rule_id),
            category_id: Some(decision.category_id),
            destination_group_id: decision.destination_group_id.clone(),
            severity: decision.severity,
            digest_type: RoutingLogEntry::ALERT.to_string(),
            sentiment: ctx.classification.sentiment,
            intent: ctx.classification.intent.clone(),
            confidence: ctx.classification.confidence,
            escalation_score: ctx.escalation_score,
            success,
            error_message,
            attempts,
            routed_at: Utc::now(),
        };
        let entry_id = entry.id.clone();
        self.audit.record(entry).await?;

        let label = match &status {
            DeliveryStatus::Delivered | DeliveryStatus::AlreadyDelivered => "delivered",
            DeliveryStatus::Failed { .. } => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        };
        metrics::counter!("beacon_deliveries_total", "result" => label).increment(1);
        info!(
            message_id = %ctx.message.id,
            rule_id = decision.rule_id,
            destination,
            attempts,
            result = label,
            "delivery finished"
        );

        Ok(DeliveryOutcome {
            decision: decision.clone(),
            status,
            attempts,
            entry_id: Some(entry_id),
        })
    }

    async fn attempt(
        &self,
        destination: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> (DeliveryStatus, u32) {
        let mut attempts = 0u32;
        loop {
            if self.limiter.acquire(destination, cancel).await.is_err() {
                return (DeliveryStatus::Cancelled, attempts);
            }
            attempts += 1;

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return (DeliveryStatus::Cancelled, attempts),
                r = tokio::time::timeout(self.policy.send_timeout, self.transport.send(destination, text)) => r,
            };
            let error = match sent {
                Ok(Ok(())) => return (DeliveryStatus::Delivered, attempts),
                Ok(Err(SendError::Permanent(m))) => {
                    return (
                        DeliveryStatus::Failed {
                            error: m,
                            permanent: true,
                        },
                        attempts,
                    );
                }
                Ok(Err(SendError::Transient(m))) => m,
                Err(_) => format!("send timed out after {:?}", self.policy.send_timeout),
            };

            if attempts >= self.policy.max_attempts {
                return (
                    DeliveryStatus::Failed {
                        error,
                        permanent: false,
                    },
                    attempts,
                );
            }

            let delay = self.policy.backoff(attempts);
            metrics::counter!("beacon_delivery_retries_total").increment(1);
            debug!(destination, attempts, ?delay, error = %error, "transient send failure, retrying");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return (DeliveryStatus::Cancelled, attempts),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
