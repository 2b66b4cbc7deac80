// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sender profile persistence.

use beacon_core::{BeaconError, SenderProfile};
use rusqlite::{params, OptionalExtension};

use crate::codec::{parse_enum, parse_ts, ts};
use crate::database::{map_tr_err, Database};

pub async fn get_profile(
    db: &Database,
    sender_id: &str,
) -> Result<Option<SenderProfile>, BeaconError> {
    let sender_id = sender_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SenderProfile>, rusqlite::Error> {
            conn.query_row(
                "SELECT sender_id, message_count, flag_count, false_positive_count, \
                 risk_level, escalation_score, last_updated \
                 FROM sender_profiles WHERE sender_id = ?1",
                params![sender_id],
                |row| {
                    Ok(SenderProfile {
                        sender_id: row.get(0)?,
                        message_count: row.get(1)?,
                        flag_count: row.get(2)?,
                        false_positive_count: row.get(3)?,
                        risk_level: parse_enum(4, &row.get::<_, String>(4)?)?,
                        escalation_score: row.get(5)?,
                        last_updated: parse_ts(6, &row.get::<_, String>(6)?)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

fn upsert_row(conn: &rusqlite::Connection, p: &SenderProfile) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sender_profiles (sender_id, message_count, flag_count, \
         false_positive_count, risk_level, escalation_score, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT(sender_id) DO UPDATE SET \
         message_count = excluded.message_count, \
         flag_count = excluded.flag_count, \
         false_positive_count = excluded.false_positive_count, \
         risk_level = excluded.risk_level, \
         escalation_score = excluded.escalation_score, \
         last_updated = excluded.last_updated",
        params![
            p.sender_id,
            p.message_count,
            p.flag_count,
            p.false_positive_count,
            p.risk_level.to_string(),
            p.escalation_score,
            ts(&p.last_updated),
        ],
    )?;
    Ok(())
}

/// Write the full profile. Callers serialize updates per sender.
pub async fn upsert_profile(db: &Database, profile: &SenderProfile) -> Result<(), BeaconError> {
    let p = profile.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> { upsert_row(conn, &p) })
        .await
        .map_err(map_tr_err)
}

/// Write the profile and mark `message_id` as counted in it, atomically.
///
/// Sender hydration treats counted messages as part of the window, so a
/// message replayed after a crash is scored without being counted twice.
pub async fn upsert_profile_counting(
    db: &Database,
    profile: &SenderProfile,
    message_id: &str,
) -> Result<(), BeaconError> {
    let p = profile.clone();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            upsert_row(&tx, &p)?;
            tx.execute(
                "UPDATE messages SET profile_counted = 1 WHERE id = ?1",
                params![message_id],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{InboundMessage, Message, RiskLevel};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use crate::queries::messages;

    #[tokio::test]
    async fn profile_round_trips_through_upsert() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        assert!(get_profile(&db, "+4477").await.unwrap().is_none());

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut profile = SenderProfile::new("+4477", at);
        upsert_profile(&db, &profile).await.unwrap();

        profile.message_count = 3;
        profile.flag_count = 1;
        profile.risk_level = RiskLevel::High;
        profile.escalation_score = 0.71;
        upsert_profile(&db, &profile).await.unwrap();

        assert_eq!(get_profile(&db, "+4477").await.unwrap().unwrap(), profile);
    }

    #[tokio::test]
    async fn counting_write_marks_the_message() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let message = Message::accept(
            "m1".into(),
            InboundMessage {
                sender_id: "+4477".into(),
                sender_name: "Ana".into(),
                group_id: None,
                text: "treadmill broken".into(),
                received_at: Some(at),
            },
        )
        .unwrap();
        messages::insert_message(&db, &message).await.unwrap();
        let since = at - chrono::Duration::hours(1);
        assert!(messages::recent_for_sender(&db, "+4477", since).await.unwrap().is_empty());

        let mut profile = SenderProfile::new("+4477", at);
        profile.message_count = 1;
        upsert_profile_counting(&db, &profile, "m1").await.unwrap();

        assert_eq!(get_profile(&db, "+4477").await.unwrap().unwrap().message_count, 1);
        let recent = messages::recent_for_sender(&db, "+4477", since).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].message_id, "m1");
    }
}
