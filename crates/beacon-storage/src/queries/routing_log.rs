// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only routing log. The schema rejects UPDATE and DELETE with triggers.

use beacon_core::{BeaconError, RoutingLogEntry, RuleId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

use crate::codec::{parse_enum, parse_ts, ts};
use crate::database::{map_tr_err, Database};
use crate::models::{DestinationStats, LogFilter, LogPage};

const COLUMNS: &str = "id, message_id, rule_id, category_id, destination_group_id, severity, \
     digest_type, sentiment, intent, confidence, escalation_score, success, error_message, \
     attempts, routed_at";

/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: i64 = 500;

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<RoutingLogEntry> {
    Ok(RoutingLogEntry {
        id: row.get(0)?,
        message_id: row.get(1)?,
        rule_id: row.get(2)?,
        category_id: row.get(3)?,
        destination_group_id: row.get(4)?,
        severity: parse_enum(5, &row.get::<_, String>(5)?)?,
        digest_type: row.get(6)?,
        sentiment: parse_enum(7, &row.get::<_, String>(7)?)?,
        intent: row.get(8)?,
        confidence: row.get(9)?,
        escalation_score: row.get(10)?,
        success: row.get(11)?,
        error_message: row.get(12)?,
        attempts: row.get(13)?,
        routed_at: parse_ts(14, &row.get::<_, String>(14)?)?,
    })
}

/// Durably append one entry.
pub async fn insert_entry(db: &Database, entry: &RoutingLogEntry) -> Result<(), BeaconError> {
    let e = entry.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                &format!(
                    "INSERT INTO routing_log ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    e.id,
                    e.message_id,
                    e.rule_id,
                    e.category_id,
                    e.destination_group_id,
                    e.severity.to_string(),
                    e.digest_type,
                    e.sentiment.to_string(),
                    e.intent,
                    e.confidence,
                    e.escalation_score,
                    e.success,
                    e.error_message,
                    e.attempts,
                    ts(&e.routed_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Whether a successful delivery has already been recorded for the triple.
pub async fn has_success(
    db: &Database,
    message_id: &str,
    rule_id: Option<RuleId>,
    destination_group_id: &str,
) -> Result<bool, BeaconError> {
    let message_id = message_id.to_string();
    let destination = destination_group_id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM routing_log WHERE message_id = ?1 \
                 AND rule_id IS ?2 AND destination_group_id = ?3 AND success = 1)",
                params![message_id, rule_id, destination],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

fn where_clause(filter: &LogFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(d) = &filter.digest_type {
        values.push(Value::Text(d.clone()));
        clauses.push(format!("digest_type = ?{}", values.len()));
    }
    if let Some(c) = filter.category_id {
        values.push(Value::Integer(c));
        clauses.push(format!("category_id = ?{}", values.len()));
    }
    if let Some(g) = &filter.destination_group_id {
        values.push(Value::Text(g.clone()));
        clauses.push(format!("destination_group_id = ?{}", values.len()));
    }
    if let Some(s) = filter.success {
        values.push(Value::Integer(i64::from(s)));
        clauses.push(format!("success = ?{}", values.len()));
    }
    if let Some(m) = &filter.message_id {
        values.push(Value::Text(m.clone()));
        clauses.push(format!("message_id = ?{}", values.len()));
    }
    if let Some(from) = &filter.from {
        values.push(Value::Text(ts(from)));
        clauses.push(format!("routed_at >= ?{}", values.len()));
    }
    if let Some(to) = &filter.to {
        values.push(Value::Text(ts(to)));
        clauses.push(format!("routed_at < ?{}", values.len()));
    }
    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

/// One page of entries, newest first, plus the total matching count.
pub async fn query_entries(
    db: &Database,
    filter: &LogFilter,
    limit: i64,
    offset: i64,
) -> Result<LogPage, BeaconError> {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let offset = offset.max(0);
    let (clause, values) = where_clause(filter);
    db.connection()
        .call(move |conn| -> Result<LogPage, rusqlite::Error> {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM routing_log {clause}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let mut paged = values;
            paged.push(Value::Integer(limit));
            paged.push(Value::Integer(offset));
            let sql = format!(
                "SELECT {COLUMNS} FROM routing_log {clause} \
                 ORDER BY routed_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
                paged.len() - 1,
                paged.len()
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params_from_iter(paged.iter()), row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogPage {
                entries,
                total,
                limit,
                offset,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Delivered and failed counts per destination for entries matching `filter`.
pub async fn destination_stats(
    db: &Database,
    filter: &LogFilter,
) -> Result<Vec<DestinationStats>, BeaconError> {
    let (clause, values) = where_clause(filter);
    db.connection()
        .call(move |conn| -> Result<Vec<DestinationStats>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT destination_group_id, \
                 COALESCE(SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0) \
                 FROM routing_log {clause} \
                 GROUP BY destination_group_id ORDER BY destination_group_id"
            ))?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                Ok(DestinationStats {
                    destination_group_id: row.get(0)?,
                    delivered: row.get(1)?,
                    failed: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{Sentiment, Severity};
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn entry(id: &str, dest: &str, success: bool, minute: u32) -> RoutingLogEntry {
        RoutingLogEntry {
            id: id.into(),
            message_id: "m1".into(),
            rule_id: Some(1),
            category_id: Some(1),
            destination_group_id: dest.into(),
            severity: Severity::High,
            digest_type: RoutingLogEntry::ALERT.into(),
            sentiment: Sentiment::Negative,
            intent: "complaint".into(),
            confidence: 0.9,
            escalation_score: 0.7,
            success,
            error_message: (!success).then(|| "bot removed".to_string()),
            attempts: 1,
            routed_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap(),
        }
    }

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn paged_query_filters_and_counts() {
        let (db, _dir) = setup().await;
        insert_entry(&db, &entry("e1", "maint", true, 1)).await.unwrap();
        insert_entry(&db, &entry("e2", "maint", false, 2)).await.unwrap();
        insert_entry(&db, &entry("e3", "front", true, 3)).await.unwrap();

        let all = query_entries(&db, &LogFilter::default(), 2, 0).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.entries.len(), 2);
        assert_eq!(all.entries[0].id, "e3");

        let failed = LogFilter {
            success: Some(false),
            ..Default::default()
        };
        let page = query_entries(&db, &failed, 50, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].error_message.as_deref(), Some("bot removed"));

        let window = LogFilter {
            from: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 2, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 3, 0).unwrap()),
            ..Default::default()
        };
        let page = query_entries(&db, &window, 50, 0).await.unwrap();
        assert_eq!(page.entries.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["e2"]);
    }

    #[tokio::test]
    async fn stats_group_by_destination() {
        let (db, _dir) = setup().await;
        insert_entry(&db, &entry("e1", "maint", true, 1)).await.unwrap();
        insert_entry(&db, &entry("e2", "maint", false, 2)).await.unwrap();
        insert_entry(&db, &entry("e3", "front", true, 3)).await.unwrap();

        let stats = destination_stats(&db, &LogFilter::default()).await.unwrap();
        assert_eq!(
            stats,
            vec![
                DestinationStats {
                    destination_group_id: "front".into(),
                    delivered: 1,
                    failed: 0
                },
                DestinationStats {
                    destination_group_id: "maint".into(),
                    delivered: 1,
                    failed: 1
                },
            ]
        );

        let later = LogFilter {
            from: Some(Utc::now() + Duration::days(1)),
            ..Default::default()
        };
        assert!(destination_stats(&db, &later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_lookup_is_per_triple() {
        let (db, _dir) = setup().await;
        insert_entry(&db, &entry("e1", "maint", false, 1)).await.unwrap();
        assert!(!has_success(&db, "m1", Some(1), "maint").await.unwrap());
        insert_entry(&db, &entry("e2", "maint", true, 2)).await.unwrap();
        assert!(has_success(&db, "m1", Some(1), "maint").await.unwrap());
        assert!(!has_success(&db, "m1", Some(2), "maint").await.unwrap());
    }

    #[tokio::test]
    async fn rows_cannot_be_rewritten() {
        let (db, _dir) = setup().await;
        insert_entry(&db, &entry("e1", "maint", false, 1)).await.unwrap();
        let result = db
            .connection()
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute("UPDATE routing_log SET success = 1", [])
            })
            .await;
        assert!(result.is_err());
        let result = db
            .connection()
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute("DELETE FROM routing_log", [])
            })
            .await;
        assert!(result.is_err());
    }
}
