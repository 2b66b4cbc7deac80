// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.

use beacon_core::BeaconError;
use tracing::debug;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply all pending migrations. Applied versions are tracked by refinery.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), BeaconError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| BeaconError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        debug!(version = migration.version(), name = %migration.name(), "migration applied");
    }
    Ok(())
}
