// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic message analysis.
//!
//! Produces sentiment, intent, entities, and a confidence value from
//! fixed word lists. No model, no network, no latency. Used whenever no
//! analysis endpoint is configured.

use std::collections::BTreeSet;

use async_trait::async_trait;
use beacon_core::{
    AdapterType, AnalysisAdapter, BeaconError, ClassificationResult, Entity, HealthStatus,
    Message, PluginAdapter, Sentiment,
};

/// Words and phrases that signal dissatisfaction.
const NEGATIVE_TERMS: &[&str] = &[
    "broken", "broke", "not working", "doesn't work", "doesnt work", "won't", "cant", "can't",
    "dirty", "filthy", "smells", "cold", "leaking", "leak", "terrible", "awful", "horrible",
    "worst", "disappointed", "angry", "unacceptable", "rude", "late", "missing", "stuck",
    "failed", "error", "crowded", "noisy", "unsafe", "injured", "hurt", "refund", "cancel",
];

/// Words and phrases that signal satisfaction.
const POSITIVE_TERMS: &[&str] = &[
    "thanks", "thank you", "great", "love", "awesome", "excellent", "amazing", "perfect",
    "happy", "helpful", "appreciate", "nice", "good job", "well done", "fantastic", "clean",
];

/// Indicators that the sender is reporting a problem.
const COMPLAINT_INDICATORS: &[&str] = &[
    "broken", "not working", "doesn't work", "doesnt work", "complain", "complaint",
    "unacceptable", "fix", "out of order", "keeps", "disappointed", "issue", "problem",
];

/// Markers of a recurring problem.
const REPEAT_MARKERS: &[&str] = &["again", "still", "every time", "third time", "second time"];

/// Question openers (prefix match).
const QUESTION_STARTS: &[&str] = &[
    "what", "when", "where", "who", "why", "how", "is ", "are ", "do ", "does ", "can i",
    "will ", "which",
];

/// Indicators of a request for action.
const REQUEST_PATTERNS: &[&str] = &[
    "please", "can you", "could you", "would you", "i need", "we need", "i want",
    "would like", "book", "reserve", "send me",
];

/// Indicators of feedback or suggestions.
const FEEDBACK_INDICATORS: &[&str] = &[
    "suggest", "suggestion", "feedback", "recommend", "would be nice", "would be great",
    "idea", "love", "enjoyed",
];

/// Greetings and sign-offs (exact or leading match on short messages).
const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "good morning", "good evening", "good afternoon", "bye",
    "see you", "thanks", "thank you",
];

/// Intent labels in tie-break order.
const INTENTS: [&str; 5] = ["complaint", "request", "question", "feedback", "greeting"];

/// Zero-latency heuristic analyzer.
pub struct LexiconAnalyzer {
    /// Confidence reported when no intent signal fires.
    floor: f64,
}

impl LexiconAnalyzer {
    /// Create an analyzer with the default confidence floor.
    pub fn new() -> Self {
        Self { floor: 0.3 }
    }

    /// Create an analyzer with a custom floor for signal-free messages.
    pub fn with_floor(floor: f64) -> Self {
        Self {
            floor: floor.clamp(0.0, 1.0),
        }
    }

    /// Analyze raw text.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();
        let words: BTreeSet<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .collect();
        let has = |term: &str| {
            if term.contains(' ') || term.contains('\'') {
                lower.contains(term)
            } else {
                words.contains(term)
            }
        };

        let negative = NEGATIVE_TERMS.iter().filter(|t| has(t)).count();
        let positive = POSITIVE_TERMS.iter().filter(|t| has(t)).count();
        let sentiment = Self::sentiment(negative, positive);

        let mut scores = [0i32; 5];

        // Complaint: problem report, negativity, recurrence
        if COMPLAINT_INDICATORS.iter().any(|t| has(t)) {
            scores[0] += 2;
        }
        if negative > 0 {
            scores[0] += 1;
        }
        if REPEAT_MARKERS.iter().any(|t| has(t)) {
            scores[0] += 1;
        }

        // Request
        if REQUEST_PATTERNS.iter().any(|t| has(t)) {
            scores[1] += 2;
        }

        // Question
        if trimmed.ends_with('?') {
            scores[2] += 2;
        }
        if QUESTION_STARTS.iter().any(|q| lower.starts_with(q)) {
            scores[2] += 1;
        }

        // Feedback
        if FEEDBACK_INDICATORS.iter().any(|t| has(t)) {
            scores[3] += 2;
        }
        if positive > 0 && negative == 0 {
            scores[3] += 1;
        }

        // Greeting: only short messages
        let word_count = trimmed.split_whitespace().count();
        let bare = lower.trim_end_matches(|c: char| !c.is_alphanumeric());
        let greets = GREETINGS.iter().any(|g| {
            bare.strip_prefix(g)
                .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_alphanumeric()))
        });
        if word_count <= 4 && greets {
            scores[4] += 3;
        }

        let (intent, confidence) = self.pick_intent(&scores);

        ClassificationResult {
            sentiment,
            intent: intent.to_string(),
            confidence,
            entities: Self::entities(trimmed),
        }
    }

    fn sentiment(negative: usize, positive: usize) -> Sentiment {
        match (negative, positive) {
            (0, 0) => Sentiment::Neutral,
            (n, 0) if n > 0 => Sentiment::Negative,
            (0, p) if p > 0 => Sentiment::Positive,
            (n, p) if n.abs_diff(p) <= 1 => Sentiment::Mixed,
            (n, p) if n > p => Sentiment::Negative,
            _ => Sentiment::Positive,
        }
    }

    /// Highest-scoring intent, first in `INTENTS` order on ties.
    fn pick_intent(&self, scores: &[i32; 5]) -> (&'static str, f64) {
        let mut best = 0usize;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = i;
            }
        }
        let top = scores[best];
        if top <= 0 {
            return (ClassificationResult::UNKNOWN_INTENT, self.floor);
        }
        let runner_up = scores
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != best)
            .map(|(_, s)| *s)
            .max()
            .unwrap_or(0)
            .max(0);
        let margin = (top - runner_up) as f64;
        let confidence = (0.5 + 0.1 * top as f64 + 0.1 * margin).min(0.95);
        (INTENTS[best], confidence)
    }

    /// Hashtags and numbers. `#3` is a number, `#pool` a hashtag.
    fn entities(text: &str) -> Vec<Entity> {
        let mut out = Vec::new();
        for raw in text.split_whitespace() {
            let word = raw.trim_matches(|c: char| !(c.is_alphanumeric() || c == '#'));
            if let Some(tag) = word.strip_prefix('#') {
                let tag = tag.trim_matches(|c: char| !c.is_alphanumeric());
                if tag.is_empty() {
                    continue;
                }
                let category = if tag.chars().all(|c| c.is_ascii_digit()) {
                    "number"
                } else {
                    "hashtag"
                };
                out.push(Entity {
                    text: tag.to_lowercase(),
                    category: category.to_string(),
                });
            } else if !word.is_empty() && word.chars().all(|c| c.is_ascii_digit()) {
                out.push(Entity {
                    text: word.to_string(),
                    category: "number".to_string(),
                });
            }
        }
        out
    }
}

impl Default for LexiconAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for LexiconAnalyzer {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Analysis
    }

    async fn health_check(&self) -> Result<HealthStatus, BeaconError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl AnalysisAdapter for LexiconAnalyzer {
    async fn analyze(&self, message: &Message) -> Result<ClassificationResult, BeaconError> {
        Ok(self.classify(&message.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_equipment_is_negative_complaint() {
        let a = LexiconAnalyzer::new();
        let r = a.classify("Treadmill #3 is broken again, third time this week");
        assert_eq!(r.sentiment, Sentiment::Negative);
        assert_eq!(r.intent, "complaint");
        assert!(r.confidence >= 0.8, "confidence was {}", r.confidence);
        assert_eq!(
            r.entities,
            vec![Entity {
                text: "3".into(),
                category: "number".into()
            }]
        );
    }

    #[test]
    fn questions() {
        let a = LexiconAnalyzer::new();
        let r = a.classify("What time does the pool open on Sunday?");
        assert_eq!(r.intent, "question");
        assert_eq!(r.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn requests() {
        let a = LexiconAnalyzer::new();
        assert_eq!(a.classify("Could you book me a spin class").intent, "request");
    }

    #[test]
    fn short_greetings() {
        let a = LexiconAnalyzer::new();
        assert_eq!(a.classify("hi").intent, "greeting");
        assert_eq!(a.classify("Good morning, team").intent, "greeting");
        // "hi" inside another word must not count
        assert_ne!(a.classify("this is fine").intent, "greeting");
    }

    #[test]
    fn feedback_is_positive() {
        let a = LexiconAnalyzer::new();
        let r = a.classify("Love the new yoga schedule, would be nice to add evenings");
        assert_eq!(r.intent, "feedback");
        assert_eq!(r.sentiment, Sentiment::Positive);
    }

    #[test]
    fn mixed_sentiment() {
        let a = LexiconAnalyzer::new();
        let r = a.classify("Great trainers but the showers are dirty");
        assert_eq!(r.sentiment, Sentiment::Mixed);
    }

    #[test]
    fn no_signal_is_unknown_at_floor() {
        let a = LexiconAnalyzer::with_floor(0.25);
        let r = a.classify("locker 12");
        assert_eq!(r.intent, "unknown");
        assert_eq!(r.confidence, 0.25);
        assert_eq!(r.entities.len(), 1);
    }

    #[test]
    fn hashtags_are_entities() {
        let a = LexiconAnalyzer::new();
        let r = a.classify("Sauna too hot again #sauna #Spa!");
        let tags: Vec<_> = r
            .entities
            .iter()
            .filter(|e| e.category == "hashtag")
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(tags, vec!["sauna", "spa"]);
    }

    #[test]
    fn confidence_is_bounded() {
        let a = LexiconAnalyzer::new();
        let r = a.classify("broken again, still not working, unacceptable, fix it please!!");
        assert!((0.0..=1.0).contains(&r.confidence));
    }

    #[tokio::test]
    async fn adapter_analyzes_message_text() {
        let a = LexiconAnalyzer::new();
        let msg = Message::accept(
            "m1".into(),
            beacon_core::InboundMessage {
                sender_id: "s1".into(),
                sender_name: "Sam".into(),
                group_id: None,
                text: "thanks!".into(),
                received_at: None,
            },
        )
        .unwrap();
        let r = a.analyze(&msg).await.unwrap();
        assert_eq!(r.intent, "greeting");
        assert_eq!(a.adapter_type(), AdapterType::Analysis);
    }
}
