// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accepted messages and the analysis recorded against them.

use beacon_core::{BeaconError, CategoryId, ClassificationResult, Entity, Message, MessageOutcome};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{from_json, parse_enum, parse_opt_ts, parse_ts, to_json, ts};
use crate::database::{map_tr_err, Database};
use crate::models::{MessageAnalysis, PriorMessage, StoredMessage, UnmatchedMessage};

const COLUMNS: &str = "id, sender_id, sender_name, group_id, text, received_at, sentiment, \
     intent, confidence, entities, degraded, category_id, match_score, escalation_score, \
     risk_level, outcome, absorbed_into";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get(2)?,
        group_id: row.get(3)?,
        text: row.get(4)?,
        received_at: parse_ts(5, &row.get::<_, String>(5)?)?,
    })
}

fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let message = row_to_message(row)?;
    let outcome: Option<String> = row.get(15)?;
    let analysis = match outcome {
        None => None,
        Some(outcome) => Some(MessageAnalysis {
            classification: ClassificationResult {
                sentiment: parse_enum(6, &row.get::<_, String>(6)?)?,
                intent: row.get(7)?,
                confidence: row.get(8)?,
                entities: from_json(9, &row.get::<_, String>(9)?)?,
            },
            degraded: row.get(10)?,
            category_id: row.get(11)?,
            match_score: row.get(12)?,
            escalation_score: row.get(13)?,
            risk_level: parse_enum(14, &row.get::<_, String>(14)?)?,
            outcome: parse_enum(15, &outcome)?,
        }),
    };
    Ok(StoredMessage {
        message,
        analysis,
        absorbed_into: row.get(16)?,
    })
}

/// Record an accepted message. Re-inserting the same id is a no-op.
pub async fn insert_message(db: &Database, message: &Message) -> Result<(), BeaconError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT OR IGNORE INTO messages \
                 (id, sender_id, sender_name, group_id, text, received_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    m.id,
                    m.sender_id,
                    m.sender_name,
                    m.group_id,
                    m.text,
                    ts(&m.received_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Attach the pipeline's verdict to a message.
pub async fn record_analysis(
    db: &Database,
    message_id: &str,
    analysis: &MessageAnalysis,
) -> Result<(), BeaconError> {
    let id = message_id.to_string();
    let a = analysis.clone();
    let processed_at = ts(&Utc::now());
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE messages SET sentiment = ?1, intent = ?2, confidence = ?3, \
                 entities = ?4, degraded = ?5, category_id = ?6, match_score = ?7, \
                 escalation_score = ?8, risk_level = ?9, outcome = ?10, processed_at = ?11 \
                 WHERE id = ?12",
                params![
                    a.classification.sentiment.to_string(),
                    a.classification.intent,
                    a.classification.confidence,
                    to_json(&a.classification.entities)?,
                    a.degraded,
                    a.category_id,
                    a.match_score,
                    a.escalation_score,
                    a.risk_level.to_string(),
                    a.outcome.to_string(),
                    processed_at,
                    id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message(db: &Database, id: &str) -> Result<Option<StoredMessage>, BeaconError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<StoredMessage>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_stored,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Accepted messages that never received a verdict, oldest first.
pub async fn unprocessed_messages(db: &Database) -> Result<Vec<Message>, BeaconError> {
    db.connection()
        .call(|conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages WHERE outcome IS NULL ORDER BY received_at, id"
            ))?;
            let rows = stmt.query_map([], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages from `sender_id` received at or after `since` that were
/// processed or already counted in the sender profile.
pub async fn recent_for_sender(
    db: &Database,
    sender_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<PriorMessage>, BeaconError> {
    let sender_id = sender_id.to_string();
    let since = ts(&since);
    db.connection()
        .call(move |conn| -> Result<Vec<PriorMessage>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, text, category_id, received_at FROM messages \
                 WHERE sender_id = ?1 AND received_at >= ?2 \
                 AND (outcome IS NOT NULL OR profile_counted = 1) \
                 ORDER BY received_at, id",
            )?;
            let rows = stmt.query_map(params![sender_id, since], |row| {
                Ok(PriorMessage {
                    message_id: row.get(0)?,
                    text: row.get(1)?,
                    category_id: row.get(2)?,
                    received_at: parse_ts(3, &row.get::<_, String>(3)?)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent `limit` unmatched messages not yet absorbed, oldest first.
pub async fn unabsorbed_unmatched(
    db: &Database,
    limit: usize,
) -> Result<Vec<UnmatchedMessage>, BeaconError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<Vec<UnmatchedMessage>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, text, entities, received_at FROM ( \
                     SELECT id, text, entities, received_at FROM messages \
                     WHERE outcome = ?1 AND absorbed_into IS NULL \
                     ORDER BY received_at DESC, id DESC LIMIT ?2 \
                 ) ORDER BY received_at, id",
            )?;
            let rows = stmt.query_map(
                params![MessageOutcome::Unmatched.to_string(), limit],
                |row| {
                    let entities: Vec<Entity> = match row.get::<_, Option<String>>(2)? {
                        Some(raw) => from_json(2, &raw)?,
                        None => Vec::new(),
                    };
                    Ok(UnmatchedMessage {
                        message_id: row.get(0)?,
                        text: row.get(1)?,
                        entity_terms: entities
                            .into_iter()
                            .map(|e| e.text.to_lowercase())
                            .collect(),
                        received_at: parse_ts(3, &row.get::<_, String>(3)?)?,
                    })
                },
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark messages as absorbed by a detected or existing category.
pub async fn mark_absorbed(
    db: &Database,
    message_ids: &[String],
    category_id: CategoryId,
) -> Result<usize, BeaconError> {
    let ids = message_ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let n = absorb_rows(&tx, &ids, category_id)?;
            tx.commit()?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Point not-yet-absorbed `ids` at `category_id` on an open connection or
/// transaction. Returns how many rows changed.
pub(crate) fn absorb_rows(
    conn: &rusqlite::Connection,
    ids: &[String],
    category_id: CategoryId,
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "UPDATE messages SET absorbed_into = ?1 \
         WHERE id = ?2 AND absorbed_into IS NULL",
    )?;
    let mut n = 0;
    for id in ids {
        n += stmt.execute(params![category_id, id])?;
    }
    Ok(n)
}

/// Message counts per outcome, for dashboard tiles.
pub async fn outcome_counts(
    db: &Database,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<(MessageOutcome, i64)>, BeaconError> {
    let since = since.map(|s| ts(&s));
    db.connection()
        .call(move |conn| -> Result<Vec<(MessageOutcome, i64)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT outcome, COUNT(*) FROM messages \
                 WHERE outcome IS NOT NULL AND (?1 IS NULL OR received_at >= ?1) \
                 GROUP BY outcome ORDER BY outcome",
            )?;
            let rows = stmt.query_map(params![since], |row| {
                Ok((parse_enum(0, &row.get::<_, String>(0)?)?, row.get(1)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Timestamp of the last processed message, if any.
pub async fn last_processed_at(db: &Database) -> Result<Option<DateTime<Utc>>, BeaconError> {
    db.connection()
        .call(|conn| -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
            let raw: Option<String> = conn.query_row(
                "SELECT MAX(processed_at) FROM messages",
                [],
                |row| row.get(0),
            )?;
            parse_opt_ts(0, raw)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{RiskLevel, Sentiment};
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn message(id: &str, sender: &str, text: &str, minutes: i64) -> Message {
        Message {
            id: id.into(),
            sender_id: sender.into(),
            sender_name: "Sam".into(),
            group_id: Some("front-desk".into()),
            text: text.into(),
            received_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    fn analysis(outcome: MessageOutcome, category_id: Option<i64>) -> MessageAnalysis {
        MessageAnalysis {
            classification: ClassificationResult {
                sentiment: Sentiment::Negative,
                intent: "complaint".into(),
                confidence: 0.8,
                entities: vec![Entity {
                    text: "#3".into(),
                    category: "equipment_id".into(),
                }],
            },
            degraded: false,
            category_id,
            match_score: 0.5,
            escalation_score: 0.4,
            risk_level: RiskLevel::Medium,
            outcome,
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
    async fn analysis_is_attached_once_processed() {
        let (db, _dir) = setup().await;
        let m = message("m1", "s1", "treadmill broken", 0);
        insert_message(&db, &m).await.unwrap();

        let stored = get_message(&db, "m1").await.unwrap().unwrap();
        assert_eq!(stored.message, m);
        assert!(stored.analysis.is_none());
        assert_eq!(unprocessed_messages(&db).await.unwrap().len(), 1);

        record_analysis(&db, "m1", &analysis(MessageOutcome::Unmatched, None))
            .await
            .unwrap();
        let stored = get_message(&db, "m1").await.unwrap().unwrap();
        assert_eq!(stored.analysis.unwrap().outcome, MessageOutcome::Unmatched);
        assert!(unprocessed_messages(&db).await.unwrap().is_empty());
        assert!(last_processed_at(&db).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sender_window_excludes_unprocessed_and_old() {
        let (db, _dir) = setup().await;
        for (id, minutes) in [("old", -120), ("a", 0), ("b", 10), ("pending", 20)] {
            insert_message(&db, &message(id, "s1", "x", minutes)).await.unwrap();
        }
        for id in ["old", "a", "b"] {
            record_analysis(&db, id, &analysis(MessageOutcome::Unmatched, None))
                .await
                .unwrap();
        }
        let since = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        let prior = recent_for_sender(&db, "s1", since).await.unwrap();
        let ids: Vec<_> = prior.iter().map(|p| p.message_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn absorption_removes_from_pool() {
        let (db, _dir) = setup().await;
        for id in ["u1", "u2", "u3"] {
            insert_message(&db, &message(id, "s1", "locker jammed", 0)).await.unwrap();
            record_analysis(&db, id, &analysis(MessageOutcome::Unmatched, None))
                .await
                .unwrap();
        }
        let pool = unabsorbed_unmatched(&db, 10).await.unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool[0].entity_terms, vec!["#3"]);

        let cat = crate::queries::categories::insert_category(
            &db,
            &crate::queries::categories::pending_candidate(
                "locker".into(),
                vec!["locker".into()],
                0.35,
                Utc::now(),
            ),
        )
        .await
        .unwrap();
        let ids = vec!["u1".to_string(), "u2".to_string()];
        assert_eq!(mark_absorbed(&db, &ids, cat.id).await.unwrap(), 2);
        assert_eq!(mark_absorbed(&db, &ids, cat.id).await.unwrap(), 0);
        let pool = unabsorbed_unmatched(&db, 10).await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].message_id, "u3");

        let counts = outcome_counts(&db, None).await.unwrap();
        assert_eq!(counts, vec![(MessageOutcome::Unmatched, 3)]);
    }
}
