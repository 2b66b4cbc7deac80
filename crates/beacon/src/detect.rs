// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `beacon detect`: one detection pass over the unmatched pool.

use beacon_bus::EventBus;
use beacon_config::model::BeaconConfig;
use beacon_core::BeaconError;
use beacon_detect::{Detector, DetectorSettings, RunOutcome};
use beacon_storage::Database;

/// Run a pass against the configured database and print the report as JSON.
///
/// Uses the same single-flight guard as the scheduler, but only within this
/// process; a running server holds its own guard.
pub async fn run_detect(config: BeaconConfig) -> Result<(), BeaconError> {
    crate::init_tracing(&config.engine.log_level);
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let detector = Detector::new(
        db.clone(),
        EventBus::default(),
        DetectorSettings::from_config(&config.detector, &config.matcher),
    );
    let outcome = detector.run().await;
    db.close().await?;

    let outcome = outcome?;
    let rendered = serde_json::to_string_pretty(&outcome)
        .map_err(|e| BeaconError::Internal(format!("render report: {e}")))?;
    println!("{rendered}");
    if let RunOutcome::Completed(report) = &outcome
        && report.failures > 0
    {
        eprintln!("warning: {} cluster(s) failed and stay in the pool", report.failures);
    }
    Ok(())
}
