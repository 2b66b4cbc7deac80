// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination group registry.

use beacon_core::{BeaconError, DestinationGroup};
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};

fn row_to_destination(row: &Row<'_>) -> rusqlite::Result<DestinationGroup> {
    Ok(DestinationGroup {
        id: row.get(0)?,
        name: row.get(1)?,
        is_active: row.get(2)?,
    })
}

/// Insert a destination, or update name and activation if it exists.
pub async fn upsert_destination(
    db: &Database,
    destination: &DestinationGroup,
) -> Result<(), BeaconError> {
    let d = destination.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO destinations (id, name, is_active) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, \
                 is_active = excluded.is_active, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![d.id, d.name, d.is_active],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a destination only if its id is unknown. Returns true when inserted.
pub async fn seed_destination(
    db: &Database,
    destination: &DestinationGroup,
) -> Result<bool, BeaconError> {
    let d = destination.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "INSERT OR IGNORE INTO destinations (id, name, is_active) VALUES (?1, ?2, ?3)",
                params![d.id, d.name, d.is_active],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_destination(
    db: &Database,
    id: &str,
) -> Result<Option<DestinationGroup>, BeaconError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<DestinationGroup>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, name, is_active FROM destinations WHERE id = ?1",
                params![id],
                row_to_destination,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_destinations(db: &Database) -> Result<Vec<DestinationGroup>, BeaconError> {
    db.connection()
        .call(|conn| -> Result<Vec<DestinationGroup>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT id, name, is_active FROM destinations ORDER BY id")?;
            let rows = stmt.query_map([], row_to_destination)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Returns false when the destination does not exist.
pub async fn delete_destination(db: &Database, id: &str) -> Result<bool, BeaconError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            Ok(conn.execute("DELETE FROM destinations WHERE id = ?1", params![id])? == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn group(id: &str, active: bool) -> DestinationGroup {
        DestinationGroup {
            id: id.into(),
            name: format!("{id} name"),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        upsert_destination(&db, &group("maint", true)).await.unwrap();
        upsert_destination(&db, &group("maint", false)).await.unwrap();
        let all = list_destinations(&db).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);
    }

    #[tokio::test]
    async fn seed_does_not_overwrite() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        upsert_destination(&db, &group("maint", false)).await.unwrap();
        assert!(!seed_destination(&db, &group("maint", true)).await.unwrap());
        assert!(!get_destination(&db, "maint").await.unwrap().unwrap().is_active);
        assert!(delete_destination(&db, "maint").await.unwrap());
        assert!(!delete_destination(&db, "maint").await.unwrap());
    }
}
