// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-side records that have no counterpart in `beacon-core`.

use beacon_core::{
    CategoryId, CategoryOrigin, CategoryStatus, ClassificationResult, Message, MessageOutcome,
    RiskLevel,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields supplied when inserting a category; the database assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub department: String,
    pub color: String,
    pub status: CategoryStatus,
    pub origin: CategoryOrigin,
    pub keywords: Vec<String>,
    pub threshold: f64,
    pub severity_bias: f64,
    pub confidence_score: f64,
    pub trend_score: f64,
    pub message_count: i64,
    pub first_detected: DateTime<Utc>,
    pub sample_messages: Vec<String>,
}

/// One recorded category lifecycle action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTransition {
    pub id: i64,
    pub category_id: CategoryId,
    pub from_status: CategoryStatus,
    pub to_status: CategoryStatus,
    pub target_id: Option<CategoryId>,
    pub approver: String,
    pub transitioned_at: DateTime<Utc>,
}

/// The pipeline's verdict on a message, stored next to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAnalysis {
    pub classification: ClassificationResult,
    pub degraded: bool,
    pub category_id: Option<CategoryId>,
    pub match_score: f64,
    pub escalation_score: f64,
    pub risk_level: RiskLevel,
    pub outcome: MessageOutcome,
}

/// A message row with its analysis, once processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message: Message,
    pub analysis: Option<MessageAnalysis>,
    pub absorbed_into: Option<CategoryId>,
}

/// A processed message from one sender, as seen by the repetition window.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorMessage {
    pub message_id: String,
    pub text: String,
    pub category_id: Option<CategoryId>,
    pub received_at: DateTime<Utc>,
}

/// An unmatched message not yet absorbed into any category.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedMessage {
    pub message_id: String,
    pub text: String,
    /// Lowercased text of each extracted entity.
    pub entity_terms: Vec<String>,
    pub received_at: DateTime<Utc>,
}

/// Routing log filters; every field is optional and they combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogFilter {
    pub digest_type: Option<String>,
    pub category_id: Option<CategoryId>,
    pub destination_group_id: Option<String>,
    pub success: Option<bool>,
    pub message_id: Option<String>,
    /// Inclusive lower bound on `routed_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `routed_at`.
    pub to: Option<DateTime<Utc>>,
}

/// One page of routing log entries, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub entries: Vec<beacon_core::RoutingLogEntry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Delivery counts for one destination group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationStats {
    pub destination_group_id: String,
    pub delivered: i64,
    pub failed: i64,
}
