// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing rule CRUD.

use beacon_core::{BeaconError, RoutingRule, RuleDraft, RuleId};
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{decode_severities, encode_severities};
use crate::database::{map_tr_err, Database};

const COLUMNS: &str = "id, category_id, destination_group_id, severity_filter, is_active, priority";

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<RoutingRule> {
    Ok(RoutingRule {
        id: row.get(0)?,
        category_id: row.get(1)?,
        destination_group_id: row.get(2)?,
        severity_filter: decode_severities(3, &row.get::<_, String>(3)?)?,
        is_active: row.get(4)?,
        priority: row.get(5)?,
    })
}

pub async fn insert_rule(db: &Database, draft: &RuleDraft) -> Result<RoutingRule, BeaconError> {
    let draft = draft.clone();
    db.connection()
        .call(move |conn| -> Result<RoutingRule, rusqlite::Error> {
            conn.execute(
                "INSERT INTO routing_rules \
                 (category_id, destination_group_id, severity_filter, is_active, priority) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    draft.category_id,
                    draft.destination_group_id,
                    encode_severities(&draft.severity_filter),
                    draft.is_active,
                    draft.priority,
                ],
            )?;
            Ok(draft.into_rule(conn.last_insert_rowid()))
        })
        .await
        .map_err(map_tr_err)
}

/// Replace every writable field of a rule in one statement.
///
/// Returns `None` when the rule does not exist.
pub async fn update_rule(
    db: &Database,
    id: RuleId,
    draft: &RuleDraft,
) -> Result<Option<RoutingRule>, BeaconError> {
    let draft = draft.clone();
    db.connection()
        .call(move |conn| -> Result<Option<RoutingRule>, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE routing_rules SET category_id = ?1, destination_group_id = ?2, \
                 severity_filter = ?3, is_active = ?4, priority = ?5, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?6",
                params![
                    draft.category_id,
                    draft.destination_group_id,
                    encode_severities(&draft.severity_filter),
                    draft.is_active,
                    draft.priority,
                    id,
                ],
            )?;
            Ok((n == 1).then(|| draft.into_rule(id)))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_rule(db: &Database, id: RuleId) -> Result<bool, BeaconError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            Ok(conn.execute("DELETE FROM routing_rules WHERE id = ?1", params![id])? == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_rule(db: &Database, id: RuleId) -> Result<Option<RoutingRule>, BeaconError> {
    db.connection()
        .call(move |conn| -> Result<Option<RoutingRule>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM routing_rules WHERE id = ?1"),
                params![id],
                row_to_rule,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All rules in evaluation order: priority ascending, then id ascending.
pub async fn list_rules(db: &Database) -> Result<Vec<RoutingRule>, BeaconError> {
    db.connection()
        .call(|conn| -> Result<Vec<RoutingRule>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM routing_rules ORDER BY priority ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], row_to_rule)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::categories::{insert_category, pending_candidate};
    use beacon_core::Severity;
    use chrono::Utc;
    use tempfile::tempdir;

    fn draft(category_id: i64, dest: &str, priority: i32) -> RuleDraft {
        RuleDraft {
            category_id,
            destination_group_id: dest.into(),
            severity_filter: [Severity::High].into_iter().collect(),
            is_active: true,
            priority,
        }
    }

    #[tokio::test]
    async fn rules_list_in_priority_order() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let cat = insert_category(&db, &pending_candidate("c".into(), vec![], 0.3, Utc::now()))
            .await
            .unwrap();

        let a = insert_rule(&db, &draft(cat.id, "a", 5)).await.unwrap();
        let b = insert_rule(&db, &draft(cat.id, "b", 1)).await.unwrap();
        let c = insert_rule(&db, &draft(cat.id, "c", 5)).await.unwrap();

        let ids: Vec<_> = list_rules(&db).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, a.id, c.id]);

        let mut changed = draft(cat.id, "a", 0);
        changed.severity_filter.insert(Severity::Medium);
        let updated = update_rule(&db, a.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.severity_filter.len(), 2);
        assert_eq!(get_rule(&db, a.id).await.unwrap().unwrap(), updated);

        assert!(update_rule(&db, 999, &changed).await.unwrap().is_none());
        assert!(delete_rule(&db, b.id).await.unwrap());
        assert_eq!(list_rules(&db).await.unwrap().len(), 2);
    }
}
