// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One message's trip: classify, match, score, evaluate rules, deliver,
//! record.
//!
//! The message row is written before processing starts and its outcome is
//! written last, so a message interrupted anywhere in between is found
//! again by startup recovery. Deliveries are idempotent per message, rule,
//! and destination, which makes that replay safe.

use std::sync::Arc;
use std::time::Instant;

use beacon_bus::{EventBus, EventKind};
use beacon_core::{BeaconError, CategoryId, Message, MessageOutcome, RoutingDecision};
use beacon_dispatch::{Delivery, DeliveryContext, DeliveryOutcome, Dispatcher, render_alert};
use beacon_escalation::{Assessment, EscalationScorer};
use beacon_router::{Catalog, CategoryMatcher, Classification, Classifier, rules};
use beacon_storage::queries::messages;
use beacon_storage::{Database, MessageAnalysis};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics;

/// Everything the pipeline decided about one message.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub message_id: String,
    pub classification: Classification,
    pub category_id: Option<CategoryId>,
    pub match_score: f64,
    pub assessment: Assessment,
    pub decisions: Vec<RoutingDecision>,
    pub deliveries: Vec<DeliveryOutcome>,
    pub outcome: MessageOutcome,
}

pub struct Pipeline {
    db: Database,
    bus: EventBus,
    classifier: Classifier,
    catalog: Arc<Catalog>,
    matcher: CategoryMatcher,
    scorer: Arc<EscalationScorer>,
    dispatcher: Arc<Dispatcher>,
}

impl Pipeline {
    pub fn new(
        db: Database,
        bus: EventBus,
        classifier: Classifier,
        catalog: Arc<Catalog>,
        matcher: CategoryMatcher,
        scorer: Arc<EscalationScorer>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            db,
            bus,
            classifier,
            catalog,
            matcher,
            scorer,
            dispatcher,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Persist `message` and run it through the pipeline.
    pub async fn ingest(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Result<ProcessReport, BeaconError> {
        messages::insert_message(&self.db, message).await?;
        self.process(message, cancel).await
    }

    /// Run an already-persisted message through the pipeline.
    ///
    /// Returns [`BeaconError::Cancelled`] if shutdown interrupts
    /// classification; the message is then left for recovery. An audit
    /// write failure also leaves the outcome unrecorded.
    pub async fn process(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Result<ProcessReport, BeaconError> {
        let started = Instant::now();
        let classification = self.classifier.classify(message, cancel).await?;
        let result = &classification.result;

        let snapshot = self.catalog.categories().await;
        let matched = self
            .matcher
            .match_message(&message.text, result, &snapshot);
        let category = matched.category.as_ref();

        let assessment = self.scorer.assess(message, result, category).await;

        let (decisions, deliveries) = match category {
            Some(category) => {
                let routing = self.catalog.routing();
                let decisions = rules::evaluate(&routing, category, assessment.severity);
                let batch: Vec<Delivery> = decisions
                    .iter()
                    .map(|d| Delivery {
                        decision: d.clone(),
                        text: render_alert(message, result, category, d.severity, assessment.score),
                    })
                    .collect();
                let ctx = DeliveryContext {
                    message,
                    classification: result,
                    escalation_score: assessment.score,
                };
                let outcomes = self.dispatcher.deliver_all(batch, ctx, cancel).await?;
                (decisions, outcomes)
            }
            None => (Vec::new(), Vec::new()),
        };

        let outcome = if category.is_none() {
            MessageOutcome::Unmatched
        } else if deliveries.is_empty() {
            MessageOutcome::Matched
        } else if deliveries.iter().any(DeliveryOutcome::succeeded) {
            MessageOutcome::Routed
        } else {
            MessageOutcome::Failed
        };

        let analysis = MessageAnalysis {
            classification: result.clone(),
            degraded: classification.degraded,
            category_id: category.map(|c| c.id),
            match_score: matched.score,
            escalation_score: assessment.score,
            risk_level: assessment.risk_level,
            outcome,
        };
        messages::record_analysis(&self.db, &message.id, &analysis).await?;

        self.bus.publish(EventKind::MessageProcessed {
            message_id: message.id.clone(),
            outcome,
        });
        metrics::record_processed(outcome);
        metrics::record_pipeline_latency(started.elapsed().as_secs_f64());

        if outcome == MessageOutcome::Unmatched {
            debug!(message_id = %message.id, best_score = matched.score, "no category matched");
        } else {
            info!(
                message_id = %message.id,
                category = category.map(|c| c.name.as_str()).unwrap_or_default(),
                score = matched.score,
                risk = %assessment.risk_level,
                decisions = decisions.len(),
                outcome = %outcome,
                "message processed"
            );
        }

        Ok(ProcessReport {
            message_id: message.id.clone(),
            category_id: category.map(|c| c.id),
            match_score: matched.score,
            classification,
            assessment,
            decisions,
            deliveries,
            outcome,
        })
    }
}
