// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Category rows and their transition history.

use beacon_core::{BeaconError, Category, CategoryId, CategoryOrigin, CategoryStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{from_json, parse_enum, parse_opt_ts, parse_ts, to_json, ts};
use crate::database::{map_tr_err, Database};
use crate::models::{CategoryTransition, NewCategory};
use crate::queries::messages;

const COLUMNS: &str = "id, name, department, color, status, origin, keywords, threshold, \
     severity_bias, confidence_score, trend_score, message_count, first_detected, \
     sample_messages, merged_into, reviewed_by, reviewed_at";

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        color: row.get(3)?,
        status: parse_enum(4, &row.get::<_, String>(4)?)?,
        origin: parse_enum(5, &row.get::<_, String>(5)?)?,
        keywords: from_json(6, &row.get::<_, String>(6)?)?,
        threshold: row.get(7)?,
        severity_bias: row.get(8)?,
        confidence_score: row.get(9)?,
        trend_score: row.get(10)?,
        message_count: row.get(11)?,
        first_detected: parse_ts(12, &row.get::<_, String>(12)?)?,
        sample_messages: from_json(13, &row.get::<_, String>(13)?)?,
        merged_into: row.get(14)?,
        reviewed_by: row.get(15)?,
        reviewed_at: parse_opt_ts(16, row.get(16)?)?,
    })
}

fn select_one(conn: &rusqlite::Connection, id: CategoryId) -> rusqlite::Result<Option<Category>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM categories WHERE id = ?1"),
        params![id],
        row_to_category,
    )
    .optional()
}

fn insert_row(conn: &rusqlite::Connection, new: &NewCategory) -> rusqlite::Result<Category> {
    conn.execute(
        "INSERT INTO categories (name, department, color, status, origin, keywords, \
         threshold, severity_bias, confidence_score, trend_score, message_count, \
         first_detected, sample_messages) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            new.name,
            new.department,
            new.color,
            new.status.to_string(),
            new.origin.to_string(),
            to_json(&new.keywords)?,
            new.threshold,
            new.severity_bias,
            new.confidence_score,
            new.trend_score,
            new.message_count,
            ts(&new.first_detected),
            to_json(&new.sample_messages)?,
        ],
    )?;
    let id = conn.last_insert_rowid();
    select_one(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Insert a category and return it with its assigned id.
pub async fn insert_category(db: &Database, new: &NewCategory) -> Result<Category, BeaconError> {
    let new = new.clone();
    db.connection()
        .call(move |conn| -> Result<Category, rusqlite::Error> { insert_row(conn, &new) })
        .await
        .map_err(map_tr_err)
}

/// Insert a detected candidate and absorb its member messages into it in
/// one transaction. Returns the category and how many messages it took.
pub async fn insert_absorbing(
    db: &Database,
    new: &NewCategory,
    message_ids: &[String],
) -> Result<(Category, usize), BeaconError> {
    let new = new.clone();
    let ids = message_ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<(Category, usize), rusqlite::Error> {
            let tx = conn.transaction()?;
            let category = insert_row(&tx, &new)?;
            let absorbed = messages::absorb_rows(&tx, &ids, category.id)?;
            tx.commit()?;
            Ok((category, absorbed))
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a static approved category unless one with the same name exists.
///
/// Returns the stored category and whether it was created by this call.
pub async fn seed_static_category(
    db: &Database,
    new: &NewCategory,
) -> Result<(Category, bool), BeaconError> {
    if let Some(existing) = find_static_by_name(db, &new.name).await? {
        return Ok((existing, false));
    }
    insert_category(db, new).await.map(|c| (c, true))
}

/// Case-insensitive lookup among static categories.
pub async fn find_static_by_name(
    db: &Database,
    name: &str,
) -> Result<Option<Category>, BeaconError> {
    let name = name.trim().to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Category>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM categories \
                     WHERE origin = 'static' AND name = ?1 COLLATE NOCASE \
                     ORDER BY id LIMIT 1"
                ),
                params![name],
                row_to_category,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_category(db: &Database, id: CategoryId) -> Result<Option<Category>, BeaconError> {
    db.connection()
        .call(move |conn| select_one(conn, id))
        .await
        .map_err(map_tr_err)
}

/// List categories ordered by id, optionally restricted to one status.
pub async fn list_categories(
    db: &Database,
    status: Option<CategoryStatus>,
) -> Result<Vec<Category>, BeaconError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Category>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM categories \
                 WHERE (?1 IS NULL OR status = ?1) ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![status], row_to_category)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Persist the detector-maintained fields of a category.
pub async fn save_detection_stats(db: &Database, category: &Category) -> Result<(), BeaconError> {
    let c = category.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE categories SET keywords = ?1, confidence_score = ?2, trend_score = ?3, \
                 message_count = ?4, sample_messages = ?5 WHERE id = ?6",
                params![
                    to_json(&c.keywords)?,
                    c.confidence_score,
                    c.trend_score,
                    c.message_count,
                    to_json(&c.sample_messages)?,
                    c.id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Set the match threshold. Returns false when the category does not exist.
pub async fn set_threshold(
    db: &Database,
    id: CategoryId,
    threshold: f64,
) -> Result<bool, BeaconError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE categories SET threshold = ?1 WHERE id = ?2",
                params![threshold, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Set the severity bias. Returns false when the category does not exist.
pub async fn set_severity_bias(
    db: &Database,
    id: CategoryId,
    bias: f64,
) -> Result<bool, BeaconError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE categories SET severity_bias = ?1 WHERE id = ?2",
                params![bias, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// A status change to apply atomically together with its audit row.
#[derive(Debug, Clone)]
pub struct TransitionWrite {
    pub id: CategoryId,
    pub from: CategoryStatus,
    pub to: CategoryStatus,
    pub target: Option<CategoryId>,
    pub approver: String,
    pub at: DateTime<Utc>,
    /// Keep at most this many samples on a merge target.
    pub max_samples: usize,
}

/// Outcome of [`apply_transition`].
#[derive(Debug, Clone)]
pub enum TransitionResult {
    /// The source category after the change, and the merge target if any.
    Applied {
        category: Category,
        target: Option<Category>,
    },
    /// The row was no longer in `from` status; nothing was written.
    Conflict(Option<Category>),
    /// The merge target was missing, not approved, or merged back into the
    /// source at commit time; nothing was written.
    TargetRejected(String),
}

/// Re-check a merge target under the write transaction: it must exist, be
/// approved, and its `merged_into` chain must not reach `source`.
fn check_target(
    tx: &rusqlite::Transaction<'_>,
    source: CategoryId,
    target: CategoryId,
) -> rusqlite::Result<Option<String>> {
    let Some(row) = select_one(tx, target)? else {
        return Ok(Some(format!("merge target {target} does not exist")));
    };
    if row.status != CategoryStatus::Approved {
        return Ok(Some(format!(
            "merge target {target} is {}, not approved",
            row.status
        )));
    }
    let mut visited = std::collections::HashSet::from([source]);
    let mut next = Some(row);
    while let Some(cat) = next {
        if !visited.insert(cat.id) {
            return Ok(Some(format!(
                "merging {source} into {target} would create a cycle"
            )));
        }
        next = match cat.merged_into {
            Some(parent) => select_one(tx, parent)?,
            None => None,
        };
    }
    Ok(None)
}

/// Change a category's status if it is still in `write.from`, record the
/// approver, and for merges fold keywords, samples, and counts into the target.
pub async fn apply_transition(
    db: &Database,
    write: TransitionWrite,
) -> Result<TransitionResult, BeaconError> {
    db.connection()
        .call(move |conn| -> Result<TransitionResult, rusqlite::Error> {
            let tx = conn.transaction()?;
            if let Some(target) = write.target
                && let Some(reason) = check_target(&tx, write.id, target)?
            {
                return Ok(TransitionResult::TargetRejected(reason));
            }
            let changed = tx.execute(
                "UPDATE categories SET status = ?1, merged_into = ?2, reviewed_by = ?3, \
                 reviewed_at = ?4 WHERE id = ?5 AND status = ?6",
                params![
                    write.to.to_string(),
                    write.target,
                    write.approver,
                    ts(&write.at),
                    write.id,
                    write.from.to_string(),
                ],
            )?;
            if changed == 0 {
                let current = select_one(&tx, write.id)?;
                return Ok(TransitionResult::Conflict(current));
            }

            tx.execute(
                "INSERT INTO category_transitions \
                 (category_id, from_status, to_status, target_id, approver, transitioned_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    write.id,
                    write.from.to_string(),
                    write.to.to_string(),
                    write.target,
                    write.approver,
                    ts(&write.at),
                ],
            )?;

            let category = select_one(&tx, write.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            let target = match write.target {
                Some(target_id) => {
                    let mut target =
                        select_one(&tx, target_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                    target.fold_keywords(&category.keywords);
                    for sample in &category.sample_messages {
                        target.push_sample(sample, write.max_samples);
                    }
                    target.message_count += category.message_count;
                    tx.execute(
                        "UPDATE categories SET keywords = ?1, sample_messages = ?2, \
                         message_count = ?3 WHERE id = ?4",
                        params![
                            to_json(&target.keywords)?,
                            to_json(&target.sample_messages)?,
                            target.message_count,
                            target.id,
                        ],
                    )?;
                    Some(target)
                }
                None => None,
            };
            tx.commit()?;
            Ok(TransitionResult::Applied { category, target })
        })
        .await
        .map_err(map_tr_err)
}

/// Transition history for a category, oldest first.
pub async fn transitions_for(
    db: &Database,
    id: CategoryId,
) -> Result<Vec<CategoryTransition>, BeaconError> {
    db.connection()
        .call(move |conn| -> Result<Vec<CategoryTransition>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, category_id, from_status, to_status, target_id, approver, \
                 transitioned_at FROM category_transitions WHERE category_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(CategoryTransition {
                    id: row.get(0)?,
                    category_id: row.get(1)?,
                    from_status: parse_enum(2, &row.get::<_, String>(2)?)?,
                    to_status: parse_enum(3, &row.get::<_, String>(3)?)?,
                    target_id: row.get(4)?,
                    approver: row.get(5)?,
                    transitioned_at: parse_ts(6, &row.get::<_, String>(6)?)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Convenience constructor for a detected pending candidate.
pub fn pending_candidate(
    name: String,
    keywords: Vec<String>,
    threshold: f64,
    first_detected: DateTime<Utc>,
) -> NewCategory {
    NewCategory {
        name,
        department: "unassigned".to_string(),
        color: "#94a3b8".to_string(),
        status: CategoryStatus::Pending,
        origin: CategoryOrigin::Detected,
        keywords,
        threshold,
        severity_bias: 0.5,
        confidence_score: 0.0,
        trend_score: 0.0,
        message_count: 0,
        first_detected,
        sample_messages: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn equipment() -> NewCategory {
        NewCategory {
            name: "Equipment".into(),
            department: "facilities".into(),
            color: "#f97316".into(),
            status: CategoryStatus::Approved,
            origin: CategoryOrigin::Static,
            keywords: vec!["broken".into(), "treadmill".into()],
            threshold: 0.35,
            severity_bias: 0.7,
            confidence_score: 1.0,
            trend_score: 0.0,
            message_count: 0,
            first_detected: Utc::now(),
            sample_messages: vec![],
        }
    }

    #[tokio::test]
    async fn insert_get_and_list() {
        let (db, _dir) = setup_db().await;
        let c = insert_category(&db, &equipment()).await.unwrap();
        assert!(c.id > 0);
        assert_eq!(c.keywords, vec!["broken", "treadmill"]);

        let got = get_category(&db, c.id).await.unwrap().unwrap();
        assert_eq!(got.name, "Equipment");
        assert_eq!(got.status, CategoryStatus::Approved);

        let pending = list_categories(&db, Some(CategoryStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());
        assert_eq!(list_categories(&db, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn seeding_twice_keeps_one_row() {
        let (db, _dir) = setup_db().await;
        let (first, created) = seed_static_category(&db, &equipment()).await.unwrap();
        assert!(created);
        let mut again = equipment();
        again.name = "equipment".into();
        let (second, created) = seed_static_category(&db, &again).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn transition_conflict_writes_nothing() {
        let (db, _dir) = setup_db().await;
        let c = insert_category(&db, &equipment()).await.unwrap();
        let result = apply_transition(
            &db,
            TransitionWrite {
                id: c.id,
                from: CategoryStatus::Pending,
                to: CategoryStatus::Approved,
                target: None,
                approver: "ops@gym".into(),
                at: Utc::now(),
                max_samples: 5,
            },
        )
        .await
        .unwrap();
        assert!(matches!(result, TransitionResult::Conflict(Some(_))));
        assert!(transitions_for(&db, c.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_folds_into_target() {
        let (db, _dir) = setup_db().await;
        let target = insert_category(&db, &equipment()).await.unwrap();
        let mut candidate =
            pending_candidate("treadmill belt".into(), vec!["belt".into()], 0.35, Utc::now());
        candidate.message_count = 4;
        candidate.sample_messages = vec!["belt slipping on treadmill".into()];
        let candidate = insert_category(&db, &candidate).await.unwrap();

        let result = apply_transition(
            &db,
            TransitionWrite {
                id: candidate.id,
                from: CategoryStatus::Pending,
                to: CategoryStatus::Merged,
                target: Some(target.id),
                approver: "lead".into(),
                at: Utc::now(),
                max_samples: 5,
            },
        )
        .await
        .unwrap();

        let TransitionResult::Applied { category, target } = result else {
            panic!("expected applied");
        };
        assert_eq!(category.status, CategoryStatus::Merged);
        assert_eq!(category.reviewed_by.as_deref(), Some("lead"));
        let target = target.unwrap();
        assert_eq!(target.keywords, vec!["belt", "broken", "treadmill"]);
        assert_eq!(target.message_count, 4);
        assert_eq!(target.sample_messages.len(), 1);

        let history = transitions_for(&db, candidate.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_status, CategoryStatus::Merged);
        assert_eq!(history[0].target_id, Some(target.id));
    }

    fn merge(id: CategoryId, target: CategoryId) -> TransitionWrite {
        TransitionWrite {
            id,
            from: CategoryStatus::Approved,
            to: CategoryStatus::Merged,
            target: Some(target),
            approver: "lead".into(),
            at: Utc::now(),
            max_samples: 5,
        }
    }

    #[tokio::test]
    async fn merge_into_merged_target_is_rejected_in_transaction() {
        let (db, _dir) = setup_db().await;
        let a = insert_category(&db, &equipment()).await.unwrap();
        let mut other = equipment();
        other.name = "Lockers".into();
        let b = insert_category(&db, &other).await.unwrap();

        let first = apply_transition(&db, merge(a.id, b.id)).await.unwrap();
        assert!(matches!(first, TransitionResult::Applied { .. }));

        // b was approved when the caller looked; a is merged by now.
        let second = apply_transition(&db, merge(b.id, a.id)).await.unwrap();
        assert!(matches!(second, TransitionResult::TargetRejected(_)));
        let b = get_category(&db, b.id).await.unwrap().unwrap();
        assert_eq!(b.status, CategoryStatus::Approved);
        assert_eq!(b.merged_into, None);
        assert!(transitions_for(&db, b.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_into_missing_target_is_rejected() {
        let (db, _dir) = setup_db().await;
        let a = insert_category(&db, &equipment()).await.unwrap();
        let result = apply_transition(&db, merge(a.id, 999)).await.unwrap();
        assert!(matches!(result, TransitionResult::TargetRejected(_)));
        let a = get_category(&db, a.id).await.unwrap().unwrap();
        assert_eq!(a.status, CategoryStatus::Approved);
    }

    #[tokio::test]
    async fn threshold_update_reports_missing_rows() {
        let (db, _dir) = setup_db().await;
        let c = insert_category(&db, &equipment()).await.unwrap();
        assert!(set_threshold(&db, c.id, 0.5).await.unwrap());
        assert!(!set_threshold(&db, 999, 0.5).await.unwrap());
        assert_eq!(get_category(&db, c.id).await.unwrap().unwrap().threshold, 0.5);
    }
}
