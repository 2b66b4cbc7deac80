// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads carried on the bus.

use beacon_core::{CategoryId, CategoryStatus, MessageOutcome, RoutingLogEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event with its id and publication time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: String,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

impl BusEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            at: Utc::now(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A routing log entry became durable.
    RoutingLogged { entry: RoutingLogEntry },
    /// A message finished the pipeline.
    MessageProcessed {
        message_id: String,
        outcome: MessageOutcome,
    },
    /// A category was created, transitioned, or retuned.
    CategoryChanged {
        category_id: CategoryId,
        status: CategoryStatus,
    },
    /// The detector surfaced a new pending candidate.
    CandidateDetected {
        category_id: CategoryId,
        name: String,
        confidence_score: f64,
    },
    RulesChanged,
    DestinationsChanged,
    SettingsChanged,
}

impl EventKind {
    /// Short label for logs.
    pub fn topic(&self) -> &'static str {
        match self {
            EventKind::RoutingLogged { .. } => "routing.logged",
            EventKind::MessageProcessed { .. } => "message.processed",
            EventKind::CategoryChanged { .. } => "category.changed",
            EventKind::CandidateDetected { .. } => "category.detected",
            EventKind::RulesChanged => "rules.changed",
            EventKind::DestinationsChanged => "destinations.changed",
            EventKind::SettingsChanged => "settings.changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = BusEvent::new(EventKind::MessageProcessed {
            message_id: "m1".into(),
            outcome: MessageOutcome::Routed,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "message_processed");
        assert_eq!(json["kind"]["outcome"], "routed");
    }
}
