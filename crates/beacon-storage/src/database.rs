// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use beacon_core::{BeaconError, HealthStatus};
use tracing::{debug, info};

/// Convert a tokio-rusqlite error into `BeaconError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> BeaconError {
    BeaconError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the engine database. Cheap to clone; clones share one writer thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path`, apply PRAGMAs and migrations.
    pub async fn open(path: &str) -> Result<Self, BeaconError> {
        Self::open_with(path, true).await
    }

    /// Like [`Database::open`], with explicit control over WAL journaling.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, BeaconError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| BeaconError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| BeaconError::Storage {
                source: Box::new(e),
            })?;

        let db = Self { conn };
        db.initialize(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    async fn initialize(&self, wal_mode: bool) -> Result<(), BeaconError> {
        let journal = if wal_mode { "WAL" } else { "DELETE" };
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let _mode: String =
                    conn.pragma_update_and_check(None, "journal_mode", journal, |row| row.get(0))?;
                conn.execute_batch(
                    "PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| -> Result<Result<(), BeaconError>, rusqlite::Error> {
                Ok(crate::migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)??;
        debug!("schema up to date");
        Ok(())
    }

    /// The shared connection. Query modules call through it.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Round-trip a trivial statement.
    pub async fn health_check(&self) -> Result<HealthStatus, BeaconError> {
        let ok: i64 = self
            .conn
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)?;
        if ok == 1 {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("unexpected probe result".into()))
        }
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), BeaconError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| BeaconError::Storage {
            source: Box::new(e),
        })?;
        debug!("database closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/beacon.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        for table in [
            "categories",
            "category_transitions",
            "destinations",
            "messages",
            "routing_log",
            "routing_rules",
            "sender_profiles",
            "settings",
        ] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beacon.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert_eq!(db.health_check().await.unwrap(), HealthStatus::Healthy);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn wal_mode_enabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
