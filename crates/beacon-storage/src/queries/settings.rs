// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-valued runtime settings.

use beacon_core::BeaconError;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{from_json, to_json};
use crate::database::{map_tr_err, Database};

/// Key holding the global severity band edges.
pub const SEVERITY_BANDS: &str = "severity_bands";

pub async fn get_setting<T>(db: &Database, key: &str) -> Result<Option<T>, BeaconError>
where
    T: DeserializeOwned + Send + 'static,
{
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<T>, rusqlite::Error> {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|r| from_json(0, &r)).transpose()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn put_setting<T: Serialize>(
    db: &Database,
    key: &str,
    value: &T,
) -> Result<(), BeaconError> {
    let key = key.to_string();
    let raw = to_json(value).map_err(|e| BeaconError::Storage {
        source: Box::new(e),
    })?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![key, raw],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Store `value` only if `key` is unset. Returns the value now in effect.
pub async fn seed_setting<T>(db: &Database, key: &str, value: &T) -> Result<T, BeaconError>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    if let Some(existing) = get_setting::<T>(db, key).await? {
        return Ok(existing);
    }
    put_setting(db, key, value).await?;
    Ok(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::SeverityBands;
    use tempfile::tempdir;

    #[tokio::test]
    async fn seed_keeps_existing_value() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let tuned = SeverityBands {
            medium: 0.2,
            high: 0.5,
            critical: 0.9,
        };
        put_setting(&db, SEVERITY_BANDS, &tuned).await.unwrap();
        let effective = seed_setting(&db, SEVERITY_BANDS, &SeverityBands::default())
            .await
            .unwrap();
        assert_eq!(effective, tuned);
        assert_eq!(
            get_setting::<SeverityBands>(&db, SEVERITY_BANDS).await.unwrap(),
            Some(tuned)
        );
    }
}
