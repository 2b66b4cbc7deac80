// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain records shared by every stage of the routing pipeline.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::BeaconError;

/// Identifier of a category row. Lower ids win match ties.
pub type CategoryId = i64;

/// Identifier of a routing rule row.
pub type RuleId = i64;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Analysis,
    Transport,
    Storage,
}

// --- Messages ---

/// A chat message as it arrives at the ingestion boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    /// Origin group; `None` for direct messages.
    #[serde(default)]
    pub group_id: Option<String>,
    pub text: String,
    /// Defaults to the time of acceptance when omitted.
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

/// An accepted, immutable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub group_id: Option<String>,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Validate an inbound message and assign it an id.
    pub fn accept(id: String, inbound: InboundMessage) -> Result<Self, BeaconError> {
        let sender_id = inbound.sender_id.trim().to_string();
        if sender_id.is_empty() {
            return Err(BeaconError::Validation("sender_id must not be empty".into()));
        }
        if inbound.text.trim().is_empty() {
            return Err(BeaconError::Validation("text must not be empty".into()));
        }
        let group_id = inbound
            .group_id
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        Ok(Self {
            id,
            sender_name: if inbound.sender_name.trim().is_empty() {
                sender_id.clone()
            } else {
                inbound.sender_name
            },
            sender_id,
            group_id,
            text: inbound.text,
            received_at: inbound.received_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Terminal state of one message's trip through the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageOutcome {
    /// No category cleared its threshold; queued for detection.
    Unmatched,
    /// Matched a category but no rule fired.
    Matched,
    /// At least one delivery succeeded.
    Routed,
    /// Every delivery attempted for the message failed.
    Failed,
}

// --- Classification ---

/// Sentiment label attached to a classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

impl Sentiment {
    /// Magnitude of negativity in [0, 1] before confidence weighting.
    pub fn negativity(self) -> f64 {
        match self {
            Sentiment::Negative => 1.0,
            Sentiment::Mixed => 0.5,
            Sentiment::Neutral | Sentiment::Positive => 0.0,
        }
    }
}

/// A named entity extracted from message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub category: String,
}

/// Output of the external analysis call for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub sentiment: Sentiment,
    pub intent: String,
    /// Certainty in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl ClassificationResult {
    /// Intent label used when analysis is unavailable.
    pub const UNKNOWN_INTENT: &'static str = "unknown";

    /// Deterministic result substituted for a failed or timed-out analysis.
    pub fn fallback() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            intent: Self::UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
            entities: Vec::new(),
        }
    }
}

// --- Categories ---

/// Lifecycle status of a category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    Approved,
    Pending,
    Rejected,
    Merged,
}

/// Where a category came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CategoryOrigin {
    /// Created by configuration or an administrator.
    Static,
    /// Surfaced by the dynamic category detector.
    Detected,
}

/// An issue category that messages can be matched against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub department: String,
    pub color: String,
    pub status: CategoryStatus,
    pub origin: CategoryOrigin,
    /// Lowercased, sorted, de-duplicated.
    pub keywords: Vec<String>,
    /// Minimum match score in [0, 1] for this category.
    pub threshold: f64,
    /// Inherent severity bias in [0, 1] fed into escalation scoring.
    pub severity_bias: f64,
    pub confidence_score: f64,
    pub trend_score: f64,
    pub message_count: i64,
    pub first_detected: DateTime<Utc>,
    /// Most recent representative messages, oldest first.
    pub sample_messages: Vec<String>,
    pub merged_into: Option<CategoryId>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Category {
    /// Keyword set as a `BTreeSet` for overlap computations.
    pub fn keyword_set(&self) -> BTreeSet<String> {
        self.keywords.iter().cloned().collect()
    }

    /// Append a sample, evicting the oldest once `max` samples are held.
    pub fn push_sample(&mut self, text: &str, max: usize) {
        if max == 0 {
            return;
        }
        self.sample_messages.push(text.to_string());
        if self.sample_messages.len() > max {
            let excess = self.sample_messages.len() - max;
            self.sample_messages.drain(..excess);
        }
    }

    /// Replace keywords with the normalized union of the current set and `extra`.
    pub fn fold_keywords<I, S>(&mut self, extra: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = self.keyword_set();
        set.extend(extra.into_iter().map(|k| k.as_ref().trim().to_lowercase()));
        set.remove("");
        self.keywords = set.into_iter().collect();
    }
}

// --- Senders ---

/// Risk band derived from an escalation score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Severity label used for rule filtering.
    pub fn severity(self) -> Severity {
        match self {
            RiskLevel::Low => Severity::Low,
            RiskLevel::Medium => Severity::Medium,
            RiskLevel::High | RiskLevel::Critical => Severity::High,
        }
    }

    /// Whether a message at this level counts as a flag against its sender.
    pub fn is_flagged(self) -> bool {
        self >= RiskLevel::High
    }
}

/// Lower edges of the MEDIUM, HIGH, and CRITICAL bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityBands {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            medium: 0.3,
            high: 0.6,
            critical: 0.8,
        }
    }
}

impl SeverityBands {
    /// Map a score onto a risk band. Pure: same score and edges, same band.
    pub fn band(&self, score: f64) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Edges must be strictly increasing within (0, 1].
    pub fn validate(&self) -> Result<(), BeaconError> {
        let ordered = 0.0 < self.medium && self.medium < self.high && self.high < self.critical;
        if !ordered || self.critical > 1.0 {
            return Err(BeaconError::Validation(format!(
                "severity bands must satisfy 0 < medium < high < critical <= 1, got {}/{}/{}",
                self.medium, self.high, self.critical
            )));
        }
        Ok(())
    }
}

/// Rolling behavioral profile for one sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub sender_id: String,
    pub message_count: i64,
    pub flag_count: i64,
    pub false_positive_count: i64,
    pub risk_level: RiskLevel,
    pub escalation_score: f64,
    pub last_updated: DateTime<Utc>,
}

impl SenderProfile {
    /// A fresh profile for a sender seen for the first time.
    pub fn new(sender_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            message_count: 0,
            flag_count: 0,
            false_positive_count: 0,
            risk_level: RiskLevel::Low,
            escalation_score: 0.0,
            last_updated: now,
        }
    }

    /// Share of messages flagged, discounted by confirmed false positives.
    pub fn flag_rate(&self) -> f64 {
        if self.message_count <= 0 {
            return 0.0;
        }
        let effective = (self.flag_count - self.false_positive_count).max(0) as f64;
        (effective / self.message_count as f64).clamp(0.0, 1.0)
    }
}

// --- Routing ---

/// Severity label carried by routing rules and decisions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A chat group that can receive forwarded alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationGroup {
    /// Chat-transport group identifier.
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// Operator-managed mapping from a category to a destination group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: RuleId,
    pub category_id: CategoryId,
    pub destination_group_id: String,
    pub severity_filter: BTreeSet<Severity>,
    pub is_active: bool,
    /// Lower values are delivered first.
    pub priority: i32,
}

/// The writable fields of a routing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub category_id: CategoryId,
    pub destination_group_id: String,
    pub severity_filter: BTreeSet<Severity>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

impl RuleDraft {
    /// Shape checks that need no database access.
    pub fn validate_shape(&self) -> Result<(), BeaconError> {
        if self.severity_filter.is_empty() {
            return Err(BeaconError::Validation(
                "severity_filter must contain at least one severity".into(),
            ));
        }
        if self.destination_group_id.trim().is_empty() {
            return Err(BeaconError::Validation(
                "destination_group_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Attach an id to produce the stored rule.
    pub fn into_rule(self, id: RuleId) -> RoutingRule {
        RoutingRule {
            id,
            category_id: self.category_id,
            destination_group_id: self.destination_group_id,
            severity_filter: self.severity_filter,
            is_active: self.is_active,
            priority: self.priority,
        }
    }
}

/// One (rule, destination) pairing selected for a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub rule_id: RuleId,
    pub category_id: CategoryId,
    pub destination_group_id: String,
    pub severity: Severity,
    pub priority: i32,
}

/// Immutable record of one delivery attempt's final outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingLogEntry {
    pub id: String,
    pub message_id: String,
    pub rule_id: Option<RuleId>,
    pub category_id: Option<CategoryId>,
    pub destination_group_id: String,
    pub severity: Severity,
    pub digest_type: String,
    pub sentiment: Sentiment,
    pub intent: String,
    pub confidence: f64,
    pub escalation_score: f64,
    pub success: bool,
    pub error_message: Option<String>,
    /// Transport calls made before the outcome was final.
    pub attempts: u32,
    pub routed_at: DateTime<Utc>,
}

impl RoutingLogEntry {
    /// Digest type recorded for real-time alert forwarding.
    pub const ALERT: &'static str = "alert";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn inbound(sender: &str, text: &str) -> InboundMessage {
        InboundMessage {
            sender_id: sender.to_string(),
            sender_name: String::new(),
            group_id: Some("  ".to_string()),
            text: text.to_string(),
            received_at: None,
        }
    }

    #[test]
    fn accept_rejects_blank_sender_and_text() {
        assert!(Message::accept("m1".into(), inbound(" ", "hello")).is_err());
        assert!(Message::accept("m1".into(), inbound("s1", "   ")).is_err());
    }

    #[test]
    fn accept_normalizes_optional_fields() {
        let msg = Message::accept("m1".into(), inbound(" s1 ", "hello")).unwrap();
        assert_eq!(msg.sender_id, "s1");
        assert_eq!(msg.sender_name, "s1");
        assert!(msg.group_id.is_none());
    }

    #[test]
    fn fallback_classification_is_deterministic() {
        let a = ClassificationResult::fallback();
        assert_eq!(a, ClassificationResult::fallback());
        assert_eq!(a.intent, "unknown");
        assert_eq!(a.sentiment, Sentiment::Neutral);
        assert_eq!(a.confidence, 0.0);
    }

    #[test]
    fn status_and_severity_labels() {
        assert_eq!(CategoryStatus::Pending.to_string(), "pending");
        assert_eq!(CategoryStatus::from_str("Approved").unwrap(), CategoryStatus::Approved);
        assert_eq!(RiskLevel::Critical.to_string(), "CRITICAL");
        assert_eq!(Severity::from_str("HIGH").unwrap(), Severity::High);
        assert_eq!(Sentiment::from_str("negative").unwrap(), Sentiment::Negative);
    }

    #[test]
    fn risk_level_maps_to_severity() {
        assert_eq!(RiskLevel::Low.severity(), Severity::Low);
        assert_eq!(RiskLevel::Medium.severity(), Severity::Medium);
        assert_eq!(RiskLevel::High.severity(), Severity::High);
        assert_eq!(RiskLevel::Critical.severity(), Severity::High);
        assert!(RiskLevel::High.is_flagged());
        assert!(!RiskLevel::Medium.is_flagged());
    }

    #[test]
    fn default_bands() {
        let bands = SeverityBands::default();
        assert_eq!(bands.band(0.0), RiskLevel::Low);
        assert_eq!(bands.band(0.3), RiskLevel::Medium);
        assert_eq!(bands.band(0.6), RiskLevel::High);
        assert_eq!(bands.band(0.8), RiskLevel::Critical);
        assert_eq!(bands.band(1.0), RiskLevel::Critical);
        assert!(bands.validate().is_ok());
    }

    #[test]
    fn unordered_bands_fail_validation() {
        let bands = SeverityBands {
            medium: 0.5,
            high: 0.4,
            critical: 0.9,
        };
        assert!(bands.validate().is_err());
    }

    #[test]
    fn sample_ring_keeps_most_recent() {
        let mut cat = sample_category();
        for i in 0..7 {
            cat.push_sample(&format!("m{i}"), 3);
        }
        assert_eq!(cat.sample_messages, vec!["m4", "m5", "m6"]);
    }

    #[test]
    fn fold_keywords_normalizes_and_dedups() {
        let mut cat = sample_category();
        cat.fold_keywords(["Broken", "treadmill", " ", "bike"]);
        assert_eq!(cat.keywords, vec!["bike", "broken", "treadmill"]);
    }

    #[test]
    fn flag_rate_discounts_false_positives() {
        let mut profile = SenderProfile::new("s1", Utc::now());
        assert_eq!(profile.flag_rate(), 0.0);
        profile.message_count = 4;
        profile.flag_count = 3;
        profile.false_positive_count = 1;
        assert!((profile.flag_rate() - 0.5).abs() < 1e-9);
        profile.false_positive_count = 5;
        assert_eq!(profile.flag_rate(), 0.0);
    }

    #[test]
    fn rule_draft_requires_severity() {
        let draft = RuleDraft {
            category_id: 1,
            destination_group_id: "g1".into(),
            severity_filter: BTreeSet::new(),
            is_active: true,
            priority: 0,
        };
        assert!(draft.validate_shape().is_err());
    }

    fn sample_category() -> Category {
        Category {
            id: 1,
            name: "Equipment".into(),
            department: "Facilities".into(),
            color: "#f97316".into(),
            status: CategoryStatus::Approved,
            origin: CategoryOrigin::Static,
            keywords: vec!["broken".into(), "treadmill".into()],
            threshold: 0.3,
            severity_bias: 0.7,
            confidence_score: 1.0,
            trend_score: 0.0,
            message_count: 0,
            first_detected: Utc::now(),
            sample_messages: Vec::new(),
            merged_into: None,
            reviewed_by: None,
            reviewed_at: None,
        }
    }
}
