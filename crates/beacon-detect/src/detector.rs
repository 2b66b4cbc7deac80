// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-flight dynamic category detection.

use std::collections::BTreeSet;

use beacon_bus::{EventBus, EventKind};
use beacon_config::model::{DetectorConfig, MatcherConfig};
use beacon_core::{BeaconError, Category, CategoryId, CategoryStatus, text};
use beacon_storage::queries::{categories, messages};
use beacon_storage::Database;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cluster::{Cluster, PoolEntry, cluster};

/// Tunables for one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub similarity_threshold: f64,
    pub min_cluster_size: usize,
    pub max_samples: usize,
    pub max_keywords: usize,
    pub overlap_threshold: f64,
    pub window: Duration,
    pub max_pool_size: usize,
    /// Match threshold given to newly surfaced candidates.
    pub candidate_threshold: f64,
}

impl DetectorSettings {
    pub fn from_config(detector: &DetectorConfig, matcher: &MatcherConfig) -> Self {
        Self {
            similarity_threshold: detector.similarity_threshold,
            min_cluster_size: detector.min_cluster_size.max(1),
            max_samples: detector.max_samples,
            max_keywords: detector.max_keywords.max(1),
            overlap_threshold: detector.overlap_threshold,
            window: Duration::try_seconds(i64::try_from(detector.window_secs).unwrap_or(i64::MAX))
                .unwrap_or(Duration::MAX),
            max_pool_size: detector.max_pool_size,
            candidate_threshold: matcher.default_threshold,
        }
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default(), &MatcherConfig::default())
    }
}

/// What one completed pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionReport {
    pub pool_size: usize,
    pub clusters: usize,
    /// Pending candidates created this pass.
    pub created: Vec<CategoryId>,
    /// Existing pending or approved categories that absorbed a cluster.
    pub reinforced: Vec<CategoryId>,
    /// Pool messages absorbed into any category.
    pub absorbed: usize,
    /// Clusters whose handling failed; they stay in the pool.
    pub failures: usize,
}

/// Result of asking for a detection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(DetectionReport),
    /// Another pass was already running.
    Skipped,
}

enum Absorption {
    Created(CategoryId),
    Reinforced(CategoryId),
    Nothing,
}

pub struct Detector {
    db: Database,
    bus: EventBus,
    settings: DetectorSettings,
    in_flight: Mutex<()>,
}

impl Detector {
    pub fn new(db: Database, bus: EventBus, settings: DetectorSettings) -> Self {
        Self {
            db,
            bus,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Run one pass now, or skip if one is already running.
    pub async fn run(&self) -> Result<RunOutcome, BeaconError> {
        self.run_at(Utc::now()).await
    }

    /// Run one pass with an explicit clock for trend windows.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome, BeaconError> {
        let Ok(_flight) = self.in_flight.try_lock() else {
            debug!("detection already in flight, skipping");
            metrics::counter!("beacon_detector_runs_total", "result" => "skipped").increment(1);
            return Ok(RunOutcome::Skipped);
        };

        match self.pass(now).await {
            Ok(report) => {
                metrics::counter!("beacon_detector_runs_total", "result" => "completed")
                    .increment(1);
                info!(
                    pool = report.pool_size,
                    clusters = report.clusters,
                    created = report.created.len(),
                    reinforced = report.reinforced.len(),
                    absorbed = report.absorbed,
                    "detection pass complete"
                );
                Ok(RunOutcome::Completed(report))
            }
            Err(e) => {
                metrics::counter!("beacon_detector_runs_total", "result" => "failed").increment(1);
                Err(e)
            }
        }
    }

    async fn pass(&self, now: DateTime<Utc>) -> Result<DetectionReport, BeaconError> {
        let pool = messages::unabsorbed_unmatched(&self.db, self.settings.max_pool_size).await?;
        let mut report = DetectionReport {
            pool_size: pool.len(),
            ..Default::default()
        };
        if pool.is_empty() {
            return Ok(report);
        }

        let entries: Vec<PoolEntry> = pool.into_iter().map(PoolEntry::from).collect();
        let clusters = cluster(entries, self.settings.similarity_threshold);
        report.clusters = clusters.len();

        let mut known = categories::list_categories(&self.db, Some(CategoryStatus::Pending)).await?;
        known.extend(categories::list_categories(&self.db, Some(CategoryStatus::Approved)).await?);
        known.sort_by_key(|c| c.id);

        for c in clusters
            .iter()
            .filter(|c| c.len() >= self.settings.min_cluster_size)
        {
            match self.absorb(c, &mut known, now).await {
                Ok(Absorption::Created(id)) => {
                    report.created.push(id);
                    report.absorbed += c.len();
                }
                Ok(Absorption::Reinforced(id)) => {
                    report.reinforced.push(id);
                    report.absorbed += c.len();
                }
                Ok(Absorption::Nothing) => {}
                Err(e) => {
                    warn!(size = c.len(), error = %e, "cluster handling failed");
                    report.failures += 1;
                }
            }
        }
        Ok(report)
    }

    /// Fold `c` into the best-overlapping known category, or surface a new
    /// pending candidate for it.
    async fn absorb(
        &self,
        c: &Cluster,
        known: &mut Vec<Category>,
        now: DateTime<Utc>,
    ) -> Result<Absorption, BeaconError> {
        let s = &self.settings;
        let keywords = c.keywords(s.max_keywords);
        let signature: BTreeSet<String> = keywords.iter().cloned().collect();
        let ids = c.member_ids();

        if let Some(idx) = best_overlap(&signature, known, s.overlap_threshold) {
            let target_id = known[idx].id;
            let absorbed = messages::mark_absorbed(&self.db, &ids, target_id).await?;
            if absorbed == 0 {
                return Ok(Absorption::Nothing);
            }
            let target = &mut known[idx];
            target.message_count += i64::try_from(absorbed).unwrap_or(i64::MAX);
            target.trend_score = c.trend(now, s.window);
            for sample in c.samples(s.max_samples) {
                target.push_sample(&sample, s.max_samples);
            }
            categories::save_detection_stats(&self.db, target).await?;
            debug!(
                category_id = target_id,
                absorbed,
                trend = target.trend_score,
                "cluster folded into existing category"
            );
            return Ok(Absorption::Reinforced(target_id));
        }

        let mut candidate = categories::pending_candidate(
            c.name(),
            keywords,
            s.candidate_threshold,
            c.first_seen().unwrap_or(now),
        );
        candidate.confidence_score = c.cohesion();
        candidate.trend_score = c.trend(now, s.window);
        candidate.sample_messages = c.samples(s.max_samples);
        candidate.message_count = i64::try_from(c.len()).unwrap_or(i64::MAX);

        let (created, absorbed) = categories::insert_absorbing(&self.db, &candidate, &ids).await?;
        info!(
            category_id = created.id,
            name = %created.name,
            members = absorbed,
            confidence = created.confidence_score,
            "pending category candidate surfaced"
        );
        self.bus.publish(EventKind::CandidateDetected {
            category_id: created.id,
            name: created.name.clone(),
            confidence_score: created.confidence_score,
        });
        let id = created.id;
        known.push(created);
        Ok(Absorption::Created(id))
    }
}

/// Index of the category whose keywords overlap `signature` most, at or
/// above `threshold`. Lower id wins ties.
fn best_overlap(signature: &BTreeSet<String>, known: &[Category], threshold: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, cat) in known.iter().enumerate() {
        let overlap = text::overlap_coefficient(signature, &cat.keyword_set());
        if overlap < threshold {
            continue;
        }
        let better = match best {
            None => true,
            Some((j, o)) => overlap > o || (overlap == o && cat.id < known[j].id),
        };
        if better {
            best = Some((i, overlap));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{
        CategoryOrigin, ClassificationResult, InboundMessage, Message, MessageOutcome, RiskLevel,
    };
    use beacon_storage::{MessageAnalysis, NewCategory};
    use tempfile::tempdir;

    async fn setup() -> (Detector, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("d.db").to_str().unwrap())
            .await
            .unwrap();
        let detector = Detector::new(db.clone(), EventBus::default(), DetectorSettings::default());
        (detector, db, dir)
    }

    async fn unmatched(db: &Database, id: &str, body: &str) {
        let msg = Message::accept(
            id.into(),
            InboundMessage {
                sender_id: "s1".into(),
                sender_name: "Sam".into(),
                group_id: None,
                text: body.into(),
                received_at: None,
            },
        )
        .unwrap();
        messages::insert_message(db, &msg).await.unwrap();
        messages::record_analysis(
            db,
            id,
            &MessageAnalysis {
                classification: ClassificationResult::fallback(),
                degraded: true,
                category_id: None,
                match_score: 0.0,
                escalation_score: 0.0,
                risk_level: RiskLevel::Low,
                outcome: MessageOutcome::Unmatched,
            },
        )
        .await
        .unwrap();
    }

    async fn seed_locker_pool(db: &Database) {
        unmatched(db, "u1", "locker key jammed").await;
        unmatched(db, "u2", "my locker is jammed").await;
        unmatched(db, "u3", "locker jammed again").await;
        unmatched(db, "u4", "parking lights out").await;
    }

    fn completed(outcome: RunOutcome) -> DetectionReport {
        match outcome {
            RunOutcome::Completed(r) => r,
            RunOutcome::Skipped => panic!("expected a completed pass"),
        }
    }

    #[tokio::test]
    async fn surfaces_pending_candidate() {
        let (detector, db, _dir) = setup().await;
        let mut events = detector.bus.subscribe();
        seed_locker_pool(&db).await;

        let report = completed(detector.run().await.unwrap());
        assert_eq!(report.pool_size, 4);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.absorbed, 3);

        let cat = categories::get_category(&db, report.created[0]).await.unwrap().unwrap();
        assert_eq!(cat.status, CategoryStatus::Pending);
        assert_eq!(cat.origin, CategoryOrigin::Detected);
        assert_eq!(cat.message_count, 3);
        assert!(cat.keywords.contains(&"locker".to_string()));
        assert!(cat.confidence_score > 0.0 && cat.confidence_score <= 1.0);
        assert_eq!(cat.sample_messages.len(), 3);

        let event = events.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::CandidateDetected { .. }));
    }

    #[tokio::test]
    async fn failed_absorption_leaves_no_orphan_candidate() {
        let (detector, db, _dir) = setup().await;
        seed_locker_pool(&db).await;
        db.connection()
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER block_absorb BEFORE UPDATE OF absorbed_into ON messages \
                     BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;",
                )
            })
            .await
            .unwrap();

        let failed = completed(detector.run().await.unwrap());
        assert_eq!(failed.failures, 1);
        assert!(failed.created.is_empty());
        assert!(categories::list_categories(&db, None).await.unwrap().is_empty());

        db.connection()
            .call(|conn| conn.execute_batch("DROP TRIGGER block_absorb;"))
            .await
            .unwrap();
        let report = completed(detector.run().await.unwrap());
        assert_eq!(report.created.len(), 1);
        let cat = categories::get_category(&db, report.created[0]).await.unwrap().unwrap();
        assert_eq!(cat.message_count, 3);
    }

    #[tokio::test]
    async fn rerun_on_unchanged_pool_is_a_no_op() {
        let (detector, db, _dir) = setup().await;
        seed_locker_pool(&db).await;
        completed(detector.run().await.unwrap());

        let again = completed(detector.run().await.unwrap());
        assert!(again.created.is_empty());
        assert!(again.reinforced.is_empty());
        let pending = categories::list_categories(&db, Some(CategoryStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message_count, 3);
    }

    #[tokio::test]
    async fn new_members_reinforce_existing_candidate() {
        let (detector, db, _dir) = setup().await;
        seed_locker_pool(&db).await;
        let first = completed(detector.run().await.unwrap());
        let id = first.created[0];

        unmatched(&db, "u5", "locker jammed shut").await;
        unmatched(&db, "u6", "jammed locker door").await;
        unmatched(&db, "u7", "locker still jammed").await;
        let second = completed(detector.run().await.unwrap());
        assert!(second.created.is_empty());
        assert_eq!(second.reinforced, vec![id]);

        let cat = categories::get_category(&db, id).await.unwrap().unwrap();
        assert_eq!(cat.message_count, 6);
        assert_eq!(
            categories::list_categories(&db, Some(CategoryStatus::Pending))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn cluster_matching_approved_category_is_folded_in() {
        let (detector, db, _dir) = setup().await;
        let approved = categories::insert_category(
            &db,
            &NewCategory {
                name: "Lockers".into(),
                department: "Facilities".into(),
                color: "#000000".into(),
                status: CategoryStatus::Approved,
                origin: CategoryOrigin::Static,
                keywords: vec!["jammed".into(), "locker".into()],
                threshold: 0.9,
                severity_bias: 0.5,
                confidence_score: 1.0,
                trend_score: 0.0,
                message_count: 0,
                first_detected: Utc::now(),
                sample_messages: vec![],
            },
        )
        .await
        .unwrap();
        seed_locker_pool(&db).await;

        let report = completed(detector.run().await.unwrap());
        assert!(report.created.is_empty());
        assert_eq!(report.reinforced, vec![approved.id]);
        let cat = categories::get_category(&db, approved.id).await.unwrap().unwrap();
        assert_eq!(cat.message_count, 3);
        assert_eq!(cat.status, CategoryStatus::Approved);
    }

    #[tokio::test]
    async fn small_clusters_stay_in_pool() {
        let (detector, db, _dir) = setup().await;
        unmatched(&db, "u1", "sauna cold").await;
        unmatched(&db, "u2", "sauna cold again").await;
        let report = completed(detector.run().await.unwrap());
        assert_eq!(report.clusters, 1);
        assert!(report.created.is_empty());
        assert_eq!(messages::unabsorbed_unmatched(&db, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn overlapping_runs_are_skipped() {
        let (detector, _db, _dir) = setup().await;
        let _held = detector.in_flight.try_lock().unwrap();
        assert_eq!(detector.run().await.unwrap(), RunOutcome::Skipped);
    }

    #[test]
    fn best_overlap_prefers_lower_id_on_ties() {
        let mk = |id: i64, kw: &[&str]| Category {
            id,
            name: format!("c{id}"),
            department: String::new(),
            color: String::new(),
            status: CategoryStatus::Pending,
            origin: CategoryOrigin::Detected,
            keywords: kw.iter().map(|k| k.to_string()).collect(),
            threshold: 0.3,
            severity_bias: 0.5,
            confidence_score: 0.5,
            trend_score: 0.0,
            message_count: 1,
            first_detected: Utc::now(),
            sample_messages: vec![],
            merged_into: None,
            reviewed_by: None,
            reviewed_at: None,
        };
        let known = vec![mk(9, &["pool", "closed"]), mk(2, &["pool", "closed"]), mk(5, &["gym"])];
        let sig: BTreeSet<String> = ["closed", "pool"].iter().map(|s| s.to_string()).collect();
        assert_eq!(best_overlap(&sig, &known, 0.6), Some(1));
        let unrelated: BTreeSet<String> = ["towels".to_string()].into_iter().collect();
        assert_eq!(best_overlap(&unrelated, &known, 0.6), None);
    }
}
