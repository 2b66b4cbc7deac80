// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only routing log writer.
//!
//! An entry is durable before anyone hears about it: the bus event is
//! published only after the insert commits.

use std::time::Duration;

use beacon_bus::{EventBus, EventKind};
use beacon_core::{BeaconError, RoutingLogEntry};
use beacon_storage::Database;
use beacon_storage::queries::routing_log;
use tracing::{debug, error};

#[derive(Clone)]
pub struct AuditLog {
    db: Database,
    bus: EventBus,
    timeout: Duration,
}

impl AuditLog {
    pub fn new(db: Database, bus: EventBus, timeout: Duration) -> Self {
        Self { db, bus, timeout }
    }

    /// Persist `entry`, then announce it.
    ///
    /// Fails with [`BeaconError::AuditWrite`] when the write errors or does
    /// not finish within the timeout.
    pub async fn record(&self, entry: RoutingLogEntry) -> Result<(), BeaconError> {
        let result =
            tokio::time::timeout(self.timeout, routing_log::insert_entry(&self.db, &entry)).await;
        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(BeaconError::AuditWrite {
                message: format!("routing log insert for message {} failed", entry.message_id),
                source: Some(Box::new(e)),
            }),
            Err(_) => Some(BeaconError::AuditWrite {
                message: format!(
                    "routing log insert for message {} exceeded {:?}",
                    entry.message_id, self.timeout
                ),
                source: None,
            }),
        };
        if let Some(e) = failure {
            metrics::counter!("beacon_audit_writes_total", "result" => "failed").increment(1);
            error!(
                message_id = %entry.message_id,
                destination = %entry.destination_group_id,
                error = %e,
                "routing log write failed"
            );
            return Err(e);
        }

        metrics::counter!("beacon_audit_writes_total", "result" => "ok").increment(1);
        debug!(
            entry_id = %entry.id,
            message_id = %entry.message_id,
            success = entry.success,
            "routing log entry written"
        );
        self.bus.publish(EventKind::RoutingLogged { entry });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{Sentiment, Severity};
    use beacon_storage::LogFilter;
    use chrono::Utc;
    use tempfile::tempdir;

    fn entry(id: &str) -> RoutingLogEntry {
        RoutingLogEntry {
            id: id.into(),
            message_id: "m1".into(),
            rule_id: None,
            category_id: None,
            destination_group_id: "maint".into(),
            severity: Severity::Low,
            digest_type: RoutingLogEntry::ALERT.into(),
            sentiment: Sentiment::Neutral,
            intent: "unknown".into(),
            confidence: 0.0,
            escalation_score: 0.0,
            success: true,
            error_message: None,
            attempts: 1,
            routed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_persists_then_publishes() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("a.db").to_str().unwrap())
            .await
            .unwrap();
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let audit = AuditLog::new(db.clone(), bus, Duration::from_secs(5));

        audit.record(entry("e1")).await.unwrap();

        let page = routing_log::query_entries(&db, &LogFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 1);
        let event = rx.try_recv().unwrap();
        assert!(matches!(event.kind, EventKind::RoutingLogged { entry } if entry.id == "e1"));
    }

    #[tokio::test]
    async fn duplicate_id_is_an_audit_failure() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("a.db").to_str().unwrap())
            .await
            .unwrap();
        let bus = EventBus::default();
        let audit = AuditLog::new(db, bus.clone(), Duration::from_secs(5));
        audit.record(entry("e1")).await.unwrap();

        let mut rx = bus.subscribe();
        let err = audit.record(entry("e1")).await.unwrap_err();
        assert!(matches!(err, BeaconError::AuditWrite { .. }));
        assert!(rx.try_recv().is_err());
    }
}
