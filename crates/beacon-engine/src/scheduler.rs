// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic background work: detection passes and sender eviction.

use std::sync::Arc;
use std::time::Duration;

use beacon_detect::{Detector, RunOutcome};
use beacon_escalation::ProfileStore;
use beacon_router::Catalog;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run detection every `period` until cancelled. The first pass runs one
/// full period after start.
pub fn spawn_detector(
    detector: Arc<Detector>,
    catalog: Arc<Catalog>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = period.as_secs(), "detector scheduled");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match detector.run().await {
                Ok(RunOutcome::Completed(report)) => {
                    if !report.reinforced.is_empty()
                        && let Err(e) = catalog.refresh_categories().await
                    {
                        warn!(error = %e, "category refresh after detection failed");
                    }
                }
                Ok(RunOutcome::Skipped) => debug!("scheduled detection skipped, pass in flight"),
                Err(e) => warn!(error = %e, "scheduled detection failed"),
            }
        }
        debug!("detector scheduler stopped");
    })
}

/// Drop idle sender state every `period` until cancelled.
pub fn spawn_sender_eviction(
    store: Arc<ProfileStore>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let evicted = store.evict_idle(Utc::now());
            if evicted > 0 {
                debug!(evicted, remaining = store.len(), "idle senders evicted");
            }
        }
    })
}
