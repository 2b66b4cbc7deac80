// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external sentiment/intent analysis endpoint.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::{
    AdapterType, AnalysisAdapter, BeaconError, ClassificationResult, Entity, HealthStatus,
    Message, PluginAdapter, Sentiment,
};
use tracing::debug;

use crate::build_client;
use crate::types::{AnalysisRequest, AnalysisResponse};

/// Posts each message to the analysis endpoint and validates the reply.
///
/// Any non-2xx status, unreadable body, unknown sentiment label, or
/// confidence outside `[0, 1]` is an [`BeaconError::Analysis`]; the
/// classifier stage turns those into its fallback result.
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(
        endpoint: String,
        api_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, BeaconError> {
        let client = build_client(api_token, Some(timeout), "analysis")?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn analysis_error(message: String, source: Option<reqwest::Error>) -> BeaconError {
    BeaconError::Analysis {
        message,
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    }
}

fn into_result(body: AnalysisResponse) -> Result<ClassificationResult, BeaconError> {
    let sentiment = Sentiment::from_str(body.sentiment.trim()).map_err(|_| BeaconError::Analysis {
        message: format!("unknown sentiment label '{}'", body.sentiment),
        source: None,
    })?;
    if !(0.0..=1.0).contains(&body.confidence) {
        return Err(BeaconError::Analysis {
            message: format!("confidence {} outside [0, 1]", body.confidence),
            source: None,
        });
    }
    Ok(ClassificationResult {
        sentiment,
        intent: body.intent,
        confidence: body.confidence,
        entities: body
            .entities
            .into_iter()
            .map(|e| Entity {
                text: e.text,
                category: e.category,
            })
            .collect(),
    })
}

#[async_trait]
impl PluginAdapter for HttpAnalyzer {
    fn name(&self) -> &str {
        "http-analysis"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Analysis
    }

    async fn health_check(&self) -> Result<HealthStatus, BeaconError> {
        // Any HTTP answer means the endpoint is reachable.
        match self.client.get(&self.endpoint).send().await {
            Ok(resp) if resp.status().is_server_error() => Ok(HealthStatus::Degraded(format!(
                "analysis endpoint returned {}",
                resp.status()
            ))),
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "analysis endpoint unreachable: {e}"
            ))),
        }
    }
}

#[async_trait]
impl AnalysisAdapter for HttpAnalyzer {
    async fn analyze(&self, message: &Message) -> Result<ClassificationResult, BeaconError> {
        let request = AnalysisRequest {
            text: &message.text,
            sender_id: &message.sender_id,
            group_id: message.group_id.as_deref(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| analysis_error(format!("analysis request failed: {e}"), Some(e)))?;

        let status = response.status();
        debug!(status = %status, message_id = %message.id, "analysis response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(analysis_error(
                format!("analysis endpoint returned {status}: {body}"),
                None,
            ));
        }

        let body = response.text().await.map_err(|e| {
            analysis_error(format!("failed to read analysis response: {e}"), Some(e))
        })?;
        let parsed: AnalysisResponse =
            serde_json::from_str(&body).map_err(|e| BeaconError::Analysis {
                message: format!("failed to parse analysis response: {e}"),
                source: Some(Box::new(e)),
            })?;
        into_result(parsed)
    }
}
