// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup seeding of configured categories, destinations, and band edges.
//!
//! Seeding only inserts what is missing. Rows already in the database keep
//! whatever administrators changed at runtime.

use beacon_config::model::BeaconConfig;
use beacon_core::{
    BeaconError, CategoryOrigin, CategoryStatus, DestinationGroup, SeverityBands,
};
use beacon_storage::queries::{categories, destinations, settings};
use beacon_storage::{Database, NewCategory};
use chrono::Utc;
use tracing::info;

/// What seeding added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories_added: usize,
    pub destinations_added: usize,
}

/// Seed `config` into `db` and return the effective severity bands.
pub async fn seed(
    db: &Database,
    config: &BeaconConfig,
) -> Result<(SeedReport, SeverityBands), BeaconError> {
    let mut report = SeedReport::default();
    let now = Utc::now();

    for c in &config.categories {
        let new = NewCategory {
            name: c.name.trim().to_string(),
            department: c.department.clone(),
            color: c.color.clone(),
            status: CategoryStatus::Approved,
            origin: CategoryOrigin::Static,
            keywords: c.keywords.iter().map(|k| k.trim().to_lowercase()).collect(),
            threshold: c.threshold.unwrap_or(config.matcher.default_threshold),
            severity_bias: c.severity_bias,
            confidence_score: 1.0,
            trend_score: 0.0,
            message_count: 0,
            first_detected: now,
            sample_messages: Vec::new(),
        };
        let (_, created) = categories::seed_static_category(db, &new).await?;
        if created {
            report.categories_added += 1;
        }
    }

    for d in &config.destinations {
        let group = DestinationGroup {
            id: d.id.trim().to_string(),
            name: if d.name.is_empty() { d.id.clone() } else { d.name.clone() },
            is_active: d.active,
        };
        if destinations::seed_destination(db, &group).await? {
            report.destinations_added += 1;
        }
    }

    let bands = settings::seed_setting(
        db,
        settings::SEVERITY_BANDS,
        &SeverityBands::from(&config.escalation.bands),
    )
    .await?;

    info!(
        categories = report.categories_added,
        destinations = report.destinations_added,
        medium = bands.medium,
        high = bands.high,
        critical = bands.critical,
        "configuration seeded"
    );
    Ok((report, bands))
}
