// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-time classification with a deterministic fallback.
//!
//! Wraps any [`AnalysisAdapter`]. A timeout, an adapter error, or an
//! out-of-range result all yield [`ClassificationResult::fallback`] with
//! `degraded = true`; nothing except caller cancellation escapes.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::{AnalysisAdapter, BeaconError, ClassificationResult, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A classification plus whether it is the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub result: ClassificationResult,
    pub degraded: bool,
}

impl Classification {
    fn degraded() -> Self {
        Self {
            result: ClassificationResult::fallback(),
            degraded: true,
        }
    }
}

/// Timeout-bounded front for an analysis adapter.
#[derive(Clone)]
pub struct Classifier {
    adapter: Arc<dyn AnalysisAdapter>,
    timeout: Duration,
}

impl Classifier {
    pub fn new(adapter: Arc<dyn AnalysisAdapter>, timeout: Duration) -> Self {
        Self { adapter, timeout }
    }

    /// Name of the wrapped adapter.
    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Classify `message`.
    ///
    /// Returns `Err(BeaconError::Cancelled)` only when `cancel` fires first.
    pub async fn classify(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Result<Classification, BeaconError> {
        let call = tokio::time::timeout(self.timeout, self.adapter.analyze(message));
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BeaconError::Cancelled),
            outcome = call => outcome,
        };

        match outcome {
            Err(_) => {
                warn!(
                    message_id = %message.id,
                    adapter = self.adapter.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "analysis timed out, using fallback"
                );
                Ok(Classification::degraded())
            }
            Ok(Err(e)) => {
                warn!(
                    message_id = %message.id,
                    adapter = self.adapter.name(),
                    error = %e,
                    "analysis failed, using fallback"
                );
                Ok(Classification::degraded())
            }
            Ok(Ok(result)) => match sanitize(result) {
                Some(result) => {
                    debug!(
                        message_id = %message.id,
                        intent = %result.intent,
                        sentiment = %result.sentiment,
                        confidence = result.confidence,
                        "message classified"
                    );
                    Ok(Classification {
                        result,
                        degraded: false,
                    })
                }
                None => {
                    warn!(
                        message_id = %message.id,
                        adapter = self.adapter.name(),
                        "malformed analysis result, using fallback"
                    );
                    Ok(Classification::degraded())
                }
            },
        }
    }
}

/// Reject non-finite or out-of-range confidence; normalize the intent label.
fn sanitize(mut result: ClassificationResult) -> Option<ClassificationResult> {
    if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
        return None;
    }
    result.intent = result.intent.trim().to_lowercase();
    if result.intent.is_empty() {
        result.intent = ClassificationResult::UNKNOWN_INTENT.to_string();
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_core::{AdapterType, HealthStatus, InboundMessage, PluginAdapter, Sentiment};

    enum Behavior {
        Reply(ClassificationResult),
        Fail,
        Hang,
    }

    struct Scripted(Behavior);

    #[async_trait]
    impl PluginAdapter for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Analysis
        }
        async fn health_check(&self) -> Result<HealthStatus, BeaconError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl AnalysisAdapter for Scripted {
        async fn analyze(&self, _message: &Message) -> Result<ClassificationResult, BeaconError> {
            match &self.0 {
                Behavior::Reply(r) => Ok(r.clone()),
                Behavior::Fail => Err(BeaconError::Analysis {
                    message: "upstream 500".into(),
                    source: None,
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(ClassificationResult::fallback())
                }
            }
        }
    }

    fn message() -> Message {
        Message::accept(
            "m1".into(),
            InboundMessage {
                sender_id: "s1".into(),
                sender_name: "Sam".into(),
                group_id: None,
                text: "the sauna is cold".into(),
                received_at: None,
            },
        )
        .unwrap()
    }

    fn result(confidence: f64) -> ClassificationResult {
        ClassificationResult {
            sentiment: Sentiment::Negative,
            intent: " Complaint ".into(),
            confidence,
            entities: vec![],
        }
    }

    fn classifier(b: Behavior) -> Classifier {
        Classifier::new(Arc::new(Scripted(b)), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn passes_through_valid_result() {
        let c = classifier(Behavior::Reply(result(0.8)));
        let out = c.classify(&message(), &CancellationToken::new()).await.unwrap();
        assert!(!out.degraded);
        assert_eq!(out.result.intent, "complaint");
        assert_eq!(out.result.confidence, 0.8);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let c = classifier(Behavior::Hang);
        let out = c.classify(&message(), &CancellationToken::new()).await.unwrap();
        assert!(out.degraded);
        assert_eq!(out.result, ClassificationResult::fallback());
    }

    #[tokio::test]
    async fn adapter_error_falls_back() {
        let c = classifier(Behavior::Fail);
        let out = c.classify(&message(), &CancellationToken::new()).await.unwrap();
        assert!(out.degraded);
        assert_eq!(out.result.confidence, 0.0);
    }

    #[tokio::test]
    async fn out_of_range_confidence_falls_back() {
        for bad in [1.5, -0.1, f64::NAN] {
            let c = classifier(Behavior::Reply(result(bad)));
            let out = c.classify(&message(), &CancellationToken::new()).await.unwrap();
            assert!(out.degraded, "confidence {bad} should be rejected");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins() {
        let c = classifier(Behavior::Hang);
        let token = CancellationToken::new();
        token.cancel();
        let err = c.classify(&message(), &token).await.unwrap_err();
        assert!(matches!(err, BeaconError::Cancelled));
    }
}
