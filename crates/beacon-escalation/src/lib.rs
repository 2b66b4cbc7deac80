// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-sender escalation scoring for Beacon.
//!
//! [`EscalationScorer::assess`] turns a classified message, its matched
//! category, and the sender's rolling history into a bounded score and a
//! risk band, updating the sender's profile under that sender's lock.

pub mod profiles;
pub mod scorer;

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use beacon_core::{
    BeaconError, Category, ClassificationResult, Message, RiskLevel, SenderProfile, Severity,
    SeverityBands, text,
};
use beacon_storage::PriorMessage;
use chrono::Utc;
use tracing::{debug, warn};

pub use profiles::{ProfileStore, SenderState};
pub use scorer::{EscalationWeights, Signals};

/// Live severity band edges, swappable at runtime.
pub type SharedBands = Arc<ArcSwap<SeverityBands>>;

/// Escalation verdict for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub score: f64,
    pub risk_level: RiskLevel,
    pub severity: Severity,
    pub signals: Signals,
    /// Sender profile after this message was counted.
    pub profile: SenderProfile,
}

pub struct EscalationScorer {
    store: Arc<ProfileStore>,
    weights: EscalationWeights,
    near_duplicate: f64,
    bands: SharedBands,
}

impl EscalationScorer {
    pub fn new(
        store: Arc<ProfileStore>,
        weights: EscalationWeights,
        near_duplicate: f64,
        bands: SharedBands,
    ) -> Self {
        Self {
            store,
            weights,
            near_duplicate,
            bands,
        }
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    /// Score `message` and fold it into its sender's profile.
    ///
    /// Profile persistence failures are logged; the in-memory counters stay
    /// authoritative until the next successful write.
    pub async fn assess(
        &self,
        message: &Message,
        classification: &ClassificationResult,
        category: Option<&Category>,
    ) -> Assessment {
        let mut state = self.store.lock(&message.sender_id).await;
        let cutoff = message
            .received_at
            .checked_sub_signed(self.store.window())
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        state.prune(cutoff);

        let tokens = text::tokenize(&message.text);
        let repeats = count_repeats(
            &state.recent,
            message,
            &tokens,
            category.map(|c| c.id),
            self.near_duplicate,
        );
        let signals = Signals {
            repeats,
            negativity: classification.sentiment.negativity() * classification.confidence,
            category_bias: category.map_or(0.0, |c| c.severity_bias),
            flag_rate: state.profile.flag_rate(),
        };
        let score = self.weights.score(&signals);
        let risk_level = self.bands.load().band(score);

        // A replayed message is re-scored but counted once.
        let counted = state.recent.iter().any(|m| m.message_id == message.id);
        let profile = &mut state.profile;
        if !counted {
            profile.message_count += 1;
            if risk_level.is_flagged() {
                profile.flag_count += 1;
            }
        }
        profile.risk_level = risk_level;
        profile.escalation_score = score;
        profile.last_updated = Utc::now();

        let written = if counted {
            self.store.persist(&mut state).await
        } else {
            state.recent.push_back(PriorMessage {
                message_id: message.id.clone(),
                text: message.text.clone(),
                category_id: category.map(|c| c.id),
                received_at: message.received_at,
            });
            self.store.persist_counted(&mut state, &message.id).await
        };
        if let Err(e) = written {
            warn!(sender_id = %message.sender_id, error = %e, "sender profile write failed");
        }

        debug!(
            message_id = %message.id,
            sender_id = %message.sender_id,
            repeats,
            score,
            risk = %risk_level,
            "escalation assessed"
        );

        Assessment {
            score,
            risk_level,
            severity: risk_level.severity(),
            signals,
            profile: state.profile.clone(),
        }
    }

    /// Record that a past flag against `sender_id` was a false positive.
    pub async fn mark_false_positive(&self, sender_id: &str) -> Result<SenderProfile, BeaconError> {
        let mut state = self.store.lock(sender_id).await;
        if !state.persisted {
            return Err(BeaconError::not_found("sender", sender_id));
        }
        state.profile.false_positive_count += 1;
        state.profile.last_updated = Utc::now();
        self.store.persist(&mut state).await?;
        Ok(state.profile.clone())
    }

    /// Current band edges.
    pub fn bands(&self) -> SeverityBands {
        **self.bands.load()
    }
}

/// Prior messages in the window that repeat this one: same matched
/// category, or token similarity at or above `near_duplicate`.
fn count_repeats(
    recent: &std::collections::VecDeque<PriorMessage>,
    message: &Message,
    tokens: &BTreeSet<String>,
    category_id: Option<beacon_core::CategoryId>,
    near_duplicate: f64,
) -> u32 {
    let n = recent
        .iter()
        .filter(|prior| prior.message_id != message.id && prior.received_at <= message.received_at)
        .filter(|prior| {
            let same_category = category_id.is_some() && prior.category_id == category_id;
            same_category || text::jaccard(tokens, &text::tokenize(&prior.text)) >= near_duplicate
        })
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{CategoryOrigin, CategoryStatus, InboundMessage, Sentiment};
    use beacon_storage::Database;
    use beacon_storage::queries::messages;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn scorer() -> (EscalationScorer, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("e.db").to_str().unwrap())
            .await
            .unwrap();
        (scorer_on(db), dir)
    }

    fn scorer_on(db: Database) -> EscalationScorer {
        let store = Arc::new(ProfileStore::new(
            db,
            Duration::from_secs(7 * 24 * 3600),
            Duration::from_secs(5),
        ));
        let bands = Arc::new(ArcSwap::from_pointee(SeverityBands::default()));
        EscalationScorer::new(store, EscalationWeights::default(), 0.5, bands)
    }

    fn message(id: &str, sender: &str, body: &str, hours_ago: i64) -> Message {
        Message::accept(
            id.into(),
            InboundMessage {
                sender_id: sender.into(),
                sender_name: String::new(),
                group_id: Some("members".into()),
                text: body.into(),
                received_at: Some(Utc::now() - ChronoDuration::hours(hours_ago)),
            },
        )
        .unwrap()
    }

    fn complaint() -> ClassificationResult {
        ClassificationResult {
            sentiment: Sentiment::Negative,
            intent: "complaint".into(),
            confidence: 0.9,
            entities: vec![],
        }
    }

    fn equipment() -> Category {
        Category {
            id: 1,
            name: "Equipment".into(),
            department: "Facilities".into(),
            color: "#000000".into(),
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
            merged_into: None,
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    #[tokio::test]
    async fn repeated_complaints_escalate_to_high() {
        let (s, _dir) = scorer().await;
        let cat = equipment();
        s.assess(&message("m1", "ana", "bike 2 pedal broken", 48), &complaint(), Some(&cat))
            .await;
        s.assess(&message("m2", "ana", "rowing machine broken", 24), &complaint(), Some(&cat))
            .await;
        let a = s
            .assess(
                &message("m3", "ana", "Treadmill #3 is broken again, third time this week", 0),
                &complaint(),
                Some(&cat),
            )
            .await;
        assert_eq!(a.signals.repeats, 2);
        assert_eq!(a.risk_level, RiskLevel::High);
        assert_eq!(a.severity, Severity::High);
        assert_eq!(a.profile.message_count, 3);
        assert_eq!(a.profile.flag_count, 1);
    }

    #[tokio::test]
    async fn near_duplicates_count_without_a_category() {
        let (s, _dir) = scorer().await;
        s.assess(&message("m1", "bo", "sauna heater not working", 2), &complaint(), None)
            .await;
        let a = s
            .assess(&message("m2", "bo", "sauna heater still not working", 1), &complaint(), None)
            .await;
        assert_eq!(a.signals.repeats, 1);
        let other = s
            .assess(&message("m3", "bo", "parking lot lights", 0), &complaint(), None)
            .await;
        assert_eq!(other.signals.repeats, 0);
    }

    #[tokio::test]
    async fn senders_do_not_share_history() {
        let (s, _dir) = scorer().await;
        let cat = equipment();
        s.assess(&message("m1", "ana", "treadmill broken", 1), &complaint(), Some(&cat))
            .await;
        let a = s
            .assess(&message("m2", "cy", "treadmill broken", 0), &complaint(), Some(&cat))
            .await;
        assert_eq!(a.signals.repeats, 0);
    }

    #[tokio::test]
    async fn reprocessing_a_message_does_not_count_itself() {
        let (s, _dir) = scorer().await;
        let m = message("m1", "ana", "treadmill broken", 0);
        s.assess(&m, &complaint(), Some(&equipment())).await;
        let again = s.assess(&m, &complaint(), Some(&equipment())).await;
        assert_eq!(again.signals.repeats, 0);
        assert_eq!(again.profile.message_count, 1);
    }

    #[tokio::test]
    async fn message_replayed_after_restart_is_counted_once() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("e.db").to_str().unwrap())
            .await
            .unwrap();
        let m = message("m1", "ana", "treadmill broken", 0);
        messages::insert_message(&db, &m).await.unwrap();
        let first = scorer_on(db.clone())
            .assess(&m, &complaint(), Some(&equipment()))
            .await;
        assert_eq!(first.profile.message_count, 1);

        // Outcome never recorded; a fresh scorer replays the message.
        let fresh = scorer_on(db);
        let replay = fresh.assess(&m, &complaint(), Some(&equipment())).await;
        assert_eq!(replay.signals.repeats, 0);
        assert_eq!(replay.profile.message_count, 1);
        assert_eq!(replay.profile.flag_count, first.profile.flag_count);
    }

    #[tokio::test]
    async fn false_positive_discounts_flag_rate() {
        let (s, _dir) = scorer().await;
        assert!(matches!(
            s.mark_false_positive("nobody").await,
            Err(BeaconError::NotFound { .. })
        ));

        let cat = equipment();
        for (i, h) in [(1, 3), (2, 2), (3, 1)] {
            s.assess(
                &message(&format!("m{i}"), "ana", "treadmill broken", h),
                &complaint(),
                Some(&cat),
            )
            .await;
        }
        let before = s.store().get("ana").await.unwrap().unwrap();
        assert!(before.flag_count >= 1);
        let after = s.mark_false_positive("ana").await.unwrap();
        assert_eq!(after.false_positive_count, 1);
        assert!(after.flag_rate() < before.flag_rate());
    }

    #[tokio::test]
    async fn band_edges_are_read_live() {
        let (s, _dir) = scorer().await;
        s.bands.store(Arc::new(SeverityBands {
            medium: 0.01,
            high: 0.02,
            critical: 0.03,
        }));
        let a = s
            .assess(&message("m1", "dee", "treadmill broken", 0), &complaint(), Some(&equipment()))
            .await;
        assert_eq!(a.risk_level, RiskLevel::Critical);
        assert_eq!(s.bands().critical, 0.03);
    }
}
