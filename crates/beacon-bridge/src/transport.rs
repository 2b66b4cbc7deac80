// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-bridge transport: forwards alert text to a group over HTTP.

use async_trait::async_trait;
use beacon_core::{
    AdapterType, BeaconError, HealthStatus, PluginAdapter, SendError, TransportAdapter,
};
use reqwest::StatusCode;
use tracing::debug;

use crate::build_client;
use crate::types::SendRequest;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_token: Option<&str>) -> Result<Self, BeaconError> {
        let client = build_client(api_token, None, "transport")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{route}", self.base_url)
    }
}

/// Whether a non-2xx bridge status is worth retrying.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 425 | 429) || status.is_server_error()
}

#[async_trait]
impl PluginAdapter for HttpTransport {
    fn name(&self) -> &str {
        "http-bridge"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, BeaconError> {
        match self.client.get(self.url("health")).send().await {
            Ok(resp) if resp.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(resp) => Ok(HealthStatus::Degraded(format!(
                "bridge health returned {}",
                resp.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("bridge unreachable: {e}"))),
        }
    }
}

#[async_trait]
impl TransportAdapter for HttpTransport {
    async fn send(&self, destination_group_id: &str, text: &str) -> Result<(), SendError> {
        let response = self
            .client
            .post(self.url("send"))
            .json(&SendRequest {
                group_id: destination_group_id,
                text,
            })
            .send()
            .await
            .map_err(|e| SendError::Transient(format!("bridge request failed: {e}")))?;

        let status = response.status();
        debug!(status = %status, destination = destination_group_id, "bridge responded");
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            format!("bridge returned {status}")
        } else {
            body.trim().to_string()
        };
        if is_transient_status(status) {
            Err(SendError::Transient(message))
        } else {
            Err(SendError::Permanent(message))
        }
    }
}

/// Stand-in used when no bridge endpoint is configured. Every send fails
/// permanently, so routing still leaves an audit trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTransport;

#[async_trait]
impl PluginAdapter for DisabledTransport {
    fn name(&self) -> &str {
        "disabled"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, BeaconError> {
        Ok(HealthStatus::Degraded("no transport endpoint configured".into()))
    }
}

#[async_trait]
impl TransportAdapter for DisabledTransport {
    async fn send(&self, _destination_group_id: &str, _text: &str) -> Result<(), SendError> {
        Err(SendError::Permanent("no transport endpoint configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn posts_group_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer bridge-token"))
            .and(body_json(serde_json::json!({"group_id": "maint", "text": "hello"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let t = HttpTransport::new(&format!("{}/", server.uri()), Some("bridge-token")).unwrap();
        t.send("maint", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn throttling_and_server_errors_are_transient() {
        for status in [408u16, 425, 429, 500, 502, 503] {
            let server = MockServer::start().await;
            mount(&server, status, "try later").await;
            let t = HttpTransport::new(&server.uri(), None).unwrap();
            let err = t.send("maint", "x").await.unwrap_err();
            assert!(err.is_transient(), "status {status} should be transient");
        }
    }

    #[tokio::test]
    async fn client_errors_are_permanent_with_body() {
        for status in [400u16, 401, 403, 404, 410, 422] {
            let server = MockServer::start().await;
            mount(&server, status, "group not found").await;
            let t = HttpTransport::new(&server.uri(), None).unwrap();
            let err = t.send("gone", "x").await.unwrap_err();
            assert_eq!(err, SendError::Permanent("group not found".into()));
        }
    }

    #[tokio::test]
    async fn empty_error_body_names_the_status() {
        let server = MockServer::start().await;
        mount(&server, 404, "").await;
        let t = HttpTransport::new(&server.uri(), None).unwrap();
        let err = t.send("gone", "x").await.unwrap_err();
        assert!(err.message().contains("404"));
    }

    #[tokio::test]
    async fn unreachable_bridge_is_transient() {
        let t = HttpTransport::new("http://127.0.0.1:9", None).unwrap();
        assert!(t.send("maint", "x").await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn disabled_transport_fails_permanently() {
        let err = DisabledTransport.send("maint", "x").await.unwrap_err();
        assert!(!err.is_transient());
    }
}
