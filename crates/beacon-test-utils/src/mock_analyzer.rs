// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock analysis service for deterministic testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use beacon_core::{
    AdapterType, AnalysisAdapter, BeaconError, ClassificationResult, Entity, HealthStatus,
    Message, PluginAdapter, Sentiment,
};

/// A scriptable analysis service.
///
/// Returns a default result for every message unless a result was
/// registered for text containing a given phrase. A delay makes calls
/// outlast the classifier timeout; a failure makes them error.
pub struct MockAnalyzer {
    default: Mutex<ClassificationResult>,
    by_phrase: Mutex<HashMap<String, ClassificationResult>>,
    delay: Mutex<Option<Duration>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockAnalyzer {
    /// Negative complaint at 0.9 confidence, no entities.
    pub fn new() -> Self {
        Self::with_result(Self::complaint(0.9))
    }

    pub fn with_result(result: ClassificationResult) -> Self {
        Self {
            default: Mutex::new(result),
            by_phrase: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// A negative "complaint" result.
    pub fn complaint(confidence: f64) -> ClassificationResult {
        ClassificationResult {
            sentiment: Sentiment::Negative,
            intent: "complaint".into(),
            confidence,
            entities: Vec::new(),
        }
    }

    /// A neutral "question" result.
    pub fn question(confidence: f64) -> ClassificationResult {
        ClassificationResult {
            sentiment: Sentiment::Neutral,
            intent: "question".into(),
            confidence,
            entities: Vec::new(),
        }
    }

    /// Attach entities to a result.
    pub fn with_entities(mut result: ClassificationResult, entities: &[(&str, &str)]) -> ClassificationResult {
        result.entities = entities
            .iter()
            .map(|(text, category)| Entity {
                text: (*text).into(),
                category: (*category).into(),
            })
            .collect();
        result
    }

    pub async fn set_default(&self, result: ClassificationResult) {
        *self.default.lock().await = result;
    }

    /// Use `result` for any message whose lowercased text contains `phrase`.
    pub async fn respond_to(&self, phrase: &str, result: ClassificationResult) {
        self.by_phrase
            .lock()
            .await
            .insert(phrase.to_lowercase(), result);
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    pub async fn set_failure(&self, failure: Option<String>) {
        *self.failure.lock().await = failure;
    }

    /// Number of `analyze` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockAnalyzer {
    fn name(&self) -> &str {
        "mock-analyzer"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Analysis
    }

    async fn health_check(&self) -> Result<HealthStatus, BeaconError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl AnalysisAdapter for MockAnalyzer {
    async fn analyze(&self, message: &Message) -> Result<ClassificationResult, BeaconError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.failure.lock().await.clone() {
            return Err(BeaconError::Analysis {
                message: reason,
                source: None,
            });
        }
        let text = message.text.to_lowercase();
        let scripted = self
            .by_phrase
            .lock()
            .await
            .iter()
            .find(|(phrase, _)| text.contains(phrase.as_str()))
            .map(|(_, r)| r.clone());
        match scripted {
            Some(result) => Ok(result),
            None => Ok(self.default.lock().await.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::InboundMessage;

    fn msg(text: &str) -> Message {
        Message::accept(
            "m1".into(),
            InboundMessage {
                sender_id: "+1".into(),
                sender_name: String::new(),
                group_id: None,
                text: text.into(),
                received_at: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn phrase_results_override_default() {
        let analyzer = MockAnalyzer::new();
        analyzer
            .respond_to("Refund", MockAnalyzer::question(0.4))
            .await;

        let scripted = analyzer.analyze(&msg("can I get a refund?")).await.unwrap();
        assert_eq!(scripted.intent, "question");
        let default = analyzer.analyze(&msg("the app is broken")).await.unwrap();
        assert_eq!(default.intent, "complaint");
        assert_eq!(analyzer.calls(), 2);
    }

    #[tokio::test]
    async fn failure_is_reported_as_analysis_error() {
        let analyzer = MockAnalyzer::new();
        analyzer.set_failure(Some("boom".into())).await;
        let err = analyzer.analyze(&msg("hello")).await.unwrap_err();
        assert!(matches!(err, BeaconError::Analysis { .. }));
    }
}
