// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administration services behind the dashboard API.
//!
//! Every write validates its references, persists, refreshes the snapshot
//! the pipeline reads, and publishes a bus event, in that order.

use std::collections::HashSet;
use std::sync::Arc;

use beacon_bus::{EventBus, EventKind};
use beacon_core::{
    BeaconError, Category, CategoryAction, CategoryId, CategoryOrigin, CategoryStatus,
    DestinationGroup, MessageOutcome, RoutingRule, RuleDraft, RuleId, SenderProfile,
    SeverityBands, transition,
};
use beacon_detect::{Detector, RunOutcome};
use beacon_escalation::{EscalationScorer, SharedBands};
use beacon_router::Catalog;
use beacon_storage::queries::categories::{TransitionResult, TransitionWrite};
use beacon_storage::queries::{categories, destinations, messages, routing_log, rules, settings};
use beacon_storage::{
    CategoryTransition, Database, DestinationStats, LogFilter, LogPage, NewCategory,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Request to create a static category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default = "default_department")]
    pub department: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_severity_bias")]
    pub severity_bias: f64,
    /// Match threshold in [0, 1]; the configured default when absent.
    #[serde(default)]
    pub threshold: Option<f64>,
}

fn default_department() -> String {
    "general".into()
}

fn default_color() -> String {
    "#64748b".into()
}

fn default_severity_bias() -> f64 {
    0.5
}

/// Message counts by pipeline outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageStats {
    pub unmatched: i64,
    pub matched: i64,
    pub routed: i64,
    pub failed: i64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

pub struct Admin {
    db: Database,
    bus: EventBus,
    catalog: Arc<Catalog>,
    scorer: Arc<EscalationScorer>,
    detector: Arc<Detector>,
    bands: SharedBands,
    default_threshold: f64,
    max_samples: usize,
}

fn unit(name: &str, value: f64) -> Result<(), BeaconError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(BeaconError::Validation(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

impl Admin {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        bus: EventBus,
        catalog: Arc<Catalog>,
        scorer: Arc<EscalationScorer>,
        detector: Arc<Detector>,
        bands: SharedBands,
        default_threshold: f64,
        max_samples: usize,
    ) -> Self {
        Self {
            db,
            bus,
            catalog,
            scorer,
            detector,
            bands,
            default_threshold,
            max_samples,
        }
    }

    // --- Categories ---

    pub async fn create_category(&self, draft: CategoryDraft) -> Result<Category, BeaconError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(BeaconError::Validation("category name must not be empty".into()));
        }
        let threshold = draft.threshold.unwrap_or(self.default_threshold);
        unit("threshold", threshold)?;
        unit("severity_bias", draft.severity_bias)?;
        if categories::find_static_by_name(&self.db, &name).await?.is_some() {
            return Err(BeaconError::Validation(format!(
                "a category named '{name}' already exists"
            )));
        }

        let mut seen = HashSet::new();
        let keywords = draft
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty() && seen.insert(k.clone()))
            .collect();
        let category = categories::insert_category(
            &self.db,
            &NewCategory {
                name,
                department: draft.department,
                color: draft.color,
                status: CategoryStatus::Approved,
                origin: CategoryOrigin::Static,
                keywords,
                threshold,
                severity_bias: draft.severity_bias,
                confidence_score: 1.0,
                trend_score: 0.0,
                message_count: 0,
                first_detected: Utc::now(),
                sample_messages: Vec::new(),
            },
        )
        .await?;
        self.catalog.refresh_categories().await?;
        self.bus.publish(EventKind::CategoryChanged {
            category_id: category.id,
            status: category.status,
        });
        info!(category_id = category.id, name = %category.name, "category created");
        Ok(category)
    }

    pub async fn list_categories(
        &self,
        status: Option<CategoryStatus>,
    ) -> Result<Vec<Category>, BeaconError> {
        categories::list_categories(&self.db, status).await
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category, BeaconError> {
        categories::get_category(&self.db, id)
            .await?
            .ok_or_else(|| BeaconError::not_found("category", id))
    }

    pub async fn approve_category(
        &self,
        id: CategoryId,
        approver: &str,
    ) -> Result<Category, BeaconError> {
        self.apply(id, CategoryAction::Approve, approver).await
    }

    pub async fn reject_category(
        &self,
        id: CategoryId,
        approver: &str,
    ) -> Result<Category, BeaconError> {
        self.apply(id, CategoryAction::Reject, approver).await
    }

    /// Merge `id` into the approved category `target`.
    pub async fn merge_category(
        &self,
        id: CategoryId,
        target: CategoryId,
        approver: &str,
    ) -> Result<Category, BeaconError> {
        self.apply(id, CategoryAction::Merge { target }, approver)
            .await
    }

    async fn apply(
        &self,
        id: CategoryId,
        action: CategoryAction,
        approver: &str,
    ) -> Result<Category, BeaconError> {
        let approver = approver.trim();
        if approver.is_empty() {
            return Err(BeaconError::Validation("approver must not be empty".into()));
        }
        let current = self.get_category(id).await?;
        let to = transition(id, current.status, action)?;

        let target = match action {
            CategoryAction::Merge { target } => {
                self.check_merge_target(id, target).await?;
                Some(target)
            }
            _ => None,
        };

        let write = TransitionWrite {
            id,
            from: current.status,
            to,
            target,
            approver: approver.to_string(),
            at: Utc::now(),
            max_samples: self.max_samples,
        };
        let category = match categories::apply_transition(&self.db, write).await? {
            TransitionResult::Applied { category, .. } => category,
            TransitionResult::Conflict(Some(now)) => {
                return Err(BeaconError::InvalidTransition {
                    id,
                    from: now.status,
                    action: action.verb(),
                });
            }
            TransitionResult::Conflict(None) => return Err(BeaconError::not_found("category", id)),
            TransitionResult::TargetRejected(reason) => return Err(BeaconError::Validation(reason)),
        };

        self.catalog.refresh_categories().await?;
        self.bus.publish(EventKind::CategoryChanged {
            category_id: id,
            status: category.status,
        });
        info!(
            category_id = id,
            action = action.verb(),
            approver,
            status = %category.status,
            "category transitioned"
        );
        Ok(category)
    }

    /// The target must exist, be approved, and not lead back to `source`
    /// through its merge chain. `apply_transition` repeats this under the
    /// write transaction.
    async fn check_merge_target(
        &self,
        source: CategoryId,
        target: CategoryId,
    ) -> Result<(), BeaconError> {
        let target_row = categories::get_category(&self.db, target)
            .await?
            .ok_or_else(|| BeaconError::not_found("category", target))?;
        if target_row.status != CategoryStatus::Approved {
            return Err(BeaconError::Validation(format!(
                "merge target {target} is {}, not approved",
                target_row.status
            )));
        }

        let mut visited = HashSet::from([source]);
        let mut next = Some(target_row);
        while let Some(cat) = next {
            if !visited.insert(cat.id) {
                return Err(BeaconError::Validation(format!(
                    "merging {source} into {target} would create a cycle"
                )));
            }
            next = match cat.merged_into {
                Some(parent) => categories::get_category(&self.db, parent).await?,
                None => None,
            };
        }
        Ok(())
    }

    /// Set a category's threshold from a percentage in [0, 100].
    pub async fn set_category_threshold(
        &self,
        id: CategoryId,
        percent: f64,
    ) -> Result<Category, BeaconError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(BeaconError::Validation(format!(
                "threshold must be within [0, 100] percent, got {percent}"
            )));
        }
        if !categories::set_threshold(&self.db, id, percent / 100.0).await? {
            return Err(BeaconError::not_found("category", id));
        }
        self.catalog.refresh_categories().await?;
        info!(category_id = id, percent, "category threshold updated");
        self.get_category(id).await
    }

    pub async fn set_category_severity_bias(
        &self,
        id: CategoryId,
        bias: f64,
    ) -> Result<Category, BeaconError> {
        unit("severity_bias", bias)?;
        if !categories::set_severity_bias(&self.db, id, bias).await? {
            return Err(BeaconError::not_found("category", id));
        }
        self.catalog.refresh_categories().await?;
        self.get_category(id).await
    }

    pub async fn category_history(
        &self,
        id: CategoryId,
    ) -> Result<Vec<CategoryTransition>, BeaconError> {
        self.get_category(id).await?;
        categories::transitions_for(&self.db, id).await
    }

    // --- Routing rules ---

    async fn check_rule_references(&self, draft: &RuleDraft) -> Result<(), BeaconError> {
        draft.validate_shape()?;
        let category = categories::get_category(&self.db, draft.category_id).await?;
        match category {
            Some(c) if c.status == CategoryStatus::Approved => {}
            Some(c) => {
                return Err(BeaconError::InvalidRuleReference(format!(
                    "category {} is {}, not approved",
                    c.id, c.status
                )));
            }
            None => {
                return Err(BeaconError::InvalidRuleReference(format!(
                    "category {} does not exist",
                    draft.category_id
                )));
            }
        }
        if destinations::get_destination(&self.db, &draft.destination_group_id)
            .await?
            .is_none()
        {
            return Err(BeaconError::InvalidRuleReference(format!(
                "destination group '{}' is not registered",
                draft.destination_group_id
            )));
        }
        Ok(())
    }

    async fn routing_changed(&self) -> Result<(), BeaconError> {
        self.catalog.refresh_routing().await?;
        self.bus.publish(EventKind::RulesChanged);
        Ok(())
    }

    pub async fn create_rule(&self, draft: RuleDraft) -> Result<RoutingRule, BeaconError> {
        self.check_rule_references(&draft).await?;
        let rule = rules::insert_rule(&self.db, &draft).await?;
        self.routing_changed().await?;
        info!(
            rule_id = rule.id,
            category_id = rule.category_id,
            destination = %rule.destination_group_id,
            "routing rule created"
        );
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        id: RuleId,
        draft: RuleDraft,
    ) -> Result<RoutingRule, BeaconError> {
        self.check_rule_references(&draft).await?;
        let rule = rules::update_rule(&self.db, id, &draft)
            .await?
            .ok_or_else(|| BeaconError::not_found("rule", id))?;
        self.routing_changed().await?;
        Ok(rule)
    }

    pub async fn delete_rule(&self, id: RuleId) -> Result<(), BeaconError> {
        if !rules::delete_rule(&self.db, id).await? {
            return Err(BeaconError::not_found("rule", id));
        }
        self.routing_changed().await
    }

    pub async fn get_rule(&self, id: RuleId) -> Result<RoutingRule, BeaconError> {
        rules::get_rule(&self.db, id)
            .await?
            .ok_or_else(|| BeaconError::not_found("rule", id))
    }

    pub async fn list_rules(&self) -> Result<Vec<RoutingRule>, BeaconError> {
        rules::list_rules(&self.db).await
    }

    // --- Destinations ---

    /// Create or replace a destination group.
    pub async fn put_destination(
        &self,
        destination: DestinationGroup,
    ) -> Result<DestinationGroup, BeaconError> {
        let id = destination.id.trim().to_string();
        if id.is_empty() {
            return Err(BeaconError::Validation("destination id must not be empty".into()));
        }
        let destination = DestinationGroup {
            name: if destination.name.trim().is_empty() {
                id.clone()
            } else {
                destination.name
            },
            id,
            is_active: destination.is_active,
        };
        destinations::upsert_destination(&self.db, &destination).await?;
        self.catalog.refresh_routing().await?;
        self.bus.publish(EventKind::DestinationsChanged);
        info!(destination = %destination.id, active = destination.is_active, "destination saved");
        Ok(destination)
    }

    pub async fn set_destination_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<DestinationGroup, BeaconError> {
        let mut destination = self.get_destination(id).await?;
        destination.is_active = active;
        self.put_destination(destination).await
    }

    /// Remove a destination. Rules that point at it stop firing.
    pub async fn delete_destination(&self, id: &str) -> Result<(), BeaconError> {
        if !destinations::delete_destination(&self.db, id).await? {
            return Err(BeaconError::not_found("destination", id));
        }
        self.catalog.refresh_routing().await?;
        self.bus.publish(EventKind::DestinationsChanged);
        Ok(())
    }

    pub async fn get_destination(&self, id: &str) -> Result<DestinationGroup, BeaconError> {
        destinations::get_destination(&self.db, id)
            .await?
            .ok_or_else(|| BeaconError::not_found("destination", id))
    }

    pub async fn list_destinations(&self) -> Result<Vec<DestinationGroup>, BeaconError> {
        destinations::list_destinations(&self.db).await
    }

    // --- Severity bands ---

    pub fn severity_bands(&self) -> SeverityBands {
        **self.bands.load()
    }

    pub async fn set_severity_bands(
        &self,
        bands: SeverityBands,
    ) -> Result<SeverityBands, BeaconError> {
        bands.validate()?;
        settings::put_setting(&self.db, settings::SEVERITY_BANDS, &bands).await?;
        self.bands.store(Arc::new(bands));
        self.bus.publish(EventKind::SettingsChanged);
        info!(
            medium = bands.medium,
            high = bands.high,
            critical = bands.critical,
            "severity bands updated"
        );
        Ok(bands)
    }

    // --- Routing log ---

    pub async fn routing_log(
        &self,
        filter: &LogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<LogPage, BeaconError> {
        routing_log::query_entries(&self.db, filter, limit, offset).await
    }

    pub async fn routing_stats(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<DestinationStats>, BeaconError> {
        routing_log::destination_stats(&self.db, filter).await
    }

    pub async fn message_stats(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<MessageStats, BeaconError> {
        let mut stats = MessageStats::default();
        for (outcome, n) in messages::outcome_counts(&self.db, since).await? {
            match outcome {
                MessageOutcome::Unmatched => stats.unmatched = n,
                MessageOutcome::Matched => stats.matched = n,
                MessageOutcome::Routed => stats.routed = n,
                MessageOutcome::Failed => stats.failed = n,
            }
        }
        stats.last_processed_at = messages::last_processed_at(&self.db).await?;
        Ok(stats)
    }

    // --- Senders ---

    pub async fn sender_profile(&self, sender_id: &str) -> Result<SenderProfile, BeaconError> {
        self.scorer
            .store()
            .get(sender_id)
            .await?
            .ok_or_else(|| BeaconError::not_found("sender", sender_id))
    }

    pub async fn mark_false_positive(&self, sender_id: &str) -> Result<SenderProfile, BeaconError> {
        let profile = self.scorer.mark_false_positive(sender_id).await?;
        info!(sender_id, false_positives = profile.false_positive_count, "false positive recorded");
        Ok(profile)
    }

    // --- Detection ---

    /// Run a detection pass now unless one is already running.
    pub async fn run_detection_now(&self) -> Result<RunOutcome, BeaconError> {
        let outcome = self.detector.run().await?;
        if let RunOutcome::Completed(report) = &outcome
            && !report.reinforced.is_empty()
        {
            self.catalog.refresh_categories().await?;
        }
        Ok(outcome)
    }
}
