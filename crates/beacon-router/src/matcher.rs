// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Category matching.
//!
//! Each approved category is scored on keyword overlap, entity affinity,
//! and intent affinity. The weighted mean is scaled by classifier
//! confidence, so a fallback classification scores zero everywhere.
//! A category qualifies only when its score exceeds its own threshold;
//! among qualifying categories the highest score wins, lower id on ties.

use std::collections::BTreeSet;

use beacon_config::model::MatcherConfig;
use beacon_core::{Category, ClassificationResult, text};

use crate::catalog::{CategoryProfile, CategorySnapshot};

/// Relative weights of the three match signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchWeights {
    pub keyword: f64,
    pub entity: f64,
    pub intent: f64,
    /// Keyword hits needed for a full keyword signal.
    pub keyword_saturation: u32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            keyword: 0.6,
            entity: 0.2,
            intent: 0.2,
            keyword_saturation: 2,
        }
    }
}

impl From<&MatcherConfig> for MatchWeights {
    fn from(cfg: &MatcherConfig) -> Self {
        Self {
            keyword: cfg.keyword_weight,
            entity: cfg.entity_weight,
            intent: cfg.intent_weight,
            keyword_saturation: cfg.keyword_saturation,
        }
    }
}

/// Result of matching one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// The winning category, if any cleared its threshold.
    pub category: Option<Category>,
    /// Score of the winner, or the best score seen when unmatched.
    pub score: f64,
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        self.category.is_some()
    }
}

/// Pre-tokenized view of a message.
struct MessageTerms {
    /// Every lowercase word, stopwords included.
    words: BTreeSet<String>,
    lower: String,
}

impl MessageTerms {
    fn new(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let words = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { words, lower }
    }

    fn contains(&self, keyword: &str) -> bool {
        if keyword.contains(char::is_whitespace) {
            self.lower.contains(keyword)
        } else {
            self.words.contains(keyword)
        }
    }
}

/// Scores messages against a category snapshot.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    weights: MatchWeights,
}

impl CategoryMatcher {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    /// Match `text` with its classification against `snapshot`.
    pub fn match_message(
        &self,
        raw_text: &str,
        classification: &ClassificationResult,
        snapshot: &CategorySnapshot,
    ) -> MatchOutcome {
        let terms = MessageTerms::new(raw_text);
        let mut best: Option<(&CategoryProfile, f64)> = None;
        let mut best_seen = 0.0_f64;

        for profile in &snapshot.categories {
            let score = self.score(&terms, classification, profile);
            best_seen = best_seen.max(score);
            if score <= profile.category.threshold {
                continue;
            }
            // Snapshot is ascending by id, so strict > keeps the lower id on ties.
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((profile, score));
            }
        }

        match best {
            Some((profile, score)) => MatchOutcome {
                category: Some(profile.category.clone()),
                score,
            },
            None => MatchOutcome {
                category: None,
                score: best_seen,
            },
        }
    }

    fn score(
        &self,
        terms: &MessageTerms,
        classification: &ClassificationResult,
        profile: &CategoryProfile,
    ) -> f64 {
        let w = &self.weights;
        let total = w.keyword + w.entity + w.intent;
        if total <= 0.0 {
            return 0.0;
        }

        let hits = profile
            .category
            .keywords
            .iter()
            .filter(|k| terms.contains(k))
            .count();
        let saturation = w.keyword_saturation.max(1) as f64;
        let keyword = (hits as f64 / saturation).min(1.0);

        let entity = if classification.entities.is_empty() {
            0.0
        } else {
            let landed = classification
                .entities
                .iter()
                .filter(|e| {
                    let mut tokens = text::tokenize(&e.text);
                    tokens.extend(text::tokenize(&e.category));
                    tokens.iter().any(|t| profile.vocabulary.contains(t))
                })
                .count();
            landed as f64 / classification.entities.len() as f64
        };

        let intent = if text::tokenize(&classification.intent)
            .iter()
            .any(|t| profile.vocabulary.contains(t))
        {
            1.0
        } else {
            0.0
        };

        let blended = (w.keyword * keyword + w.entity * entity + w.intent * intent) / total;
        (blended * classification.confidence).clamp(0.0, 1.0)
    }
}

impl Default for CategoryMatcher {
    fn default() -> Self {
        Self::new(MatchWeights::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{CategoryOrigin, CategoryStatus, Entity, Sentiment};
    use chrono::Utc;

    fn category(id: i64, name: &str, keywords: &[&str], threshold: f64) -> Category {
        Category {
            id,
            name: name.into(),
            department: "Ops".into(),
            color: "#000000".into(),
            status: CategoryStatus::Approved,
            origin: CategoryOrigin::Static,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            threshold,
            severity_bias: 0.5,
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

    fn classification(intent: &str, confidence: f64, entities: Vec<Entity>) -> ClassificationResult {
        ClassificationResult {
            sentiment: Sentiment::Negative,
            intent: intent.into(),
            confidence,
            entities,
        }
    }

    fn snapshot(categories: Vec<Category>) -> CategorySnapshot {
        CategorySnapshot::new(categories)
    }

    #[test]
    fn keyword_match_clears_threshold() {
        let snap = snapshot(vec![
            category(1, "Equipment", &["broken", "treadmill"], 0.35),
            category(2, "Cleanliness", &["dirty", "towels"], 0.35),
        ]);
        let m = CategoryMatcher::default();
        let out = m.match_message(
            "Treadmill #3 is broken again",
            &classification("complaint", 0.9, vec![]),
            &snap,
        );
        assert_eq!(out.category.unwrap().id, 1);
        assert!((out.score - 0.54).abs() < 1e-9, "score {}", out.score);
    }

    #[test]
    fn below_threshold_is_unmatched_but_reports_score() {
        let snap = snapshot(vec![category(1, "Equipment", &["broken", "treadmill"], 0.9)]);
        let out = CategoryMatcher::default().match_message(
            "treadmill broken",
            &classification("complaint", 0.9, vec![]),
            &snap,
        );
        assert!(!out.is_matched());
        assert!(out.score > 0.0);
    }

    #[test]
    fn zero_confidence_never_matches() {
        let snap = snapshot(vec![category(1, "Equipment", &["broken"], 0.0)]);
        let out = CategoryMatcher::default().match_message(
            "broken broken broken",
            &ClassificationResult::fallback(),
            &snap,
        );
        assert!(out.category.is_none());
        assert_eq!(out.score, 0.0);
    }

    #[test]
    fn ties_go_to_lower_id() {
        let snap = snapshot(vec![
            category(7, "Gym Floor", &["weights"], 0.1),
            category(3, "Strength Area", &["weights"], 0.1),
        ]);
        let out = CategoryMatcher::default().match_message(
            "weights everywhere",
            &classification("unknown", 1.0, vec![]),
            &snap,
        );
        assert_eq!(out.category.unwrap().id, 3);
    }

    #[test]
    fn higher_score_beats_lower_id() {
        let snap = snapshot(vec![
            category(1, "General", &["pool"], 0.1),
            category(2, "Pool Safety", &["pool", "lifeguard"], 0.1),
        ]);
        let out = CategoryMatcher::default().match_message(
            "no lifeguard at the pool",
            &classification("complaint", 1.0, vec![]),
            &snap,
        );
        assert_eq!(out.category.unwrap().id, 2);
    }

    #[test]
    fn entity_and_intent_affinity_contribute() {
        let snap = snapshot(vec![category(1, "Complaint Desk", &["sauna"], 0.0)]);
        let m = CategoryMatcher::default();
        let entity = Entity {
            text: "sauna".into(),
            category: "hashtag".into(),
        };
        let full = m.match_message("#sauna", &classification("complaint", 1.0, vec![entity]), &snap);
        // keyword 0.5 (1 of 2 saturating hits), entity 1.0, intent 1.0
        assert!((full.score - (0.6 * 0.5 + 0.2 + 0.2)).abs() < 1e-9, "score {}", full.score);
    }

    #[test]
    fn multiword_keywords_match_as_phrases() {
        let snap = snapshot(vec![category(1, "Climate", &["air conditioning"], 0.1)]);
        let out = CategoryMatcher::default().match_message(
            "The air conditioning died",
            &classification("complaint", 1.0, vec![]),
            &snap,
        );
        assert!(out.is_matched());
    }

    #[test]
    fn non_approved_categories_are_ignored() {
        let mut pending = category(1, "Equipment", &["broken"], 0.0);
        pending.status = CategoryStatus::Pending;
        let out = CategoryMatcher::default().match_message(
            "broken",
            &classification("complaint", 1.0, vec![]),
            &snapshot(vec![pending]),
        );
        assert!(!out.is_matched());
    }
}
