// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP implementations of Beacon's two external collaborators.
//!
//! [`HttpAnalyzer`] calls the sentiment/intent analysis endpoint and
//! [`HttpTransport`] forwards alerts through the chat bridge. Both are
//! built from configuration by [`analyzer_from_config`] and
//! [`transport_from_config`].

pub mod analyzer;
pub mod transport;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use beacon_config::model::{ClassifierConfig, TransportConfig};
use beacon_core::{BeaconError, TransportAdapter};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

pub use analyzer::HttpAnalyzer;
pub use transport::{DisabledTransport, HttpTransport};

fn build_client(
    api_token: Option<&str>,
    timeout: Option<Duration>,
    role: &str,
) -> Result<reqwest::Client, BeaconError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = api_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| BeaconError::Config(format!("invalid {role} api_token: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10));
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder.build().map_err(|e| BeaconError::Internal(format!(
        "failed to build {role} HTTP client: {e}"
    )))
}

/// HTTP analyzer for the configured endpoint, if one is set.
pub fn analyzer_from_config(cfg: &ClassifierConfig) -> Result<Option<HttpAnalyzer>, BeaconError> {
    cfg.endpoint
        .as_deref()
        .map(|endpoint| {
            HttpAnalyzer::new(
                endpoint.to_string(),
                cfg.api_token.as_deref(),
                Duration::from_millis(cfg.timeout_ms),
            )
        })
        .transpose()
}

/// Bridge transport for the configured endpoint, or [`DisabledTransport`].
pub fn transport_from_config(
    cfg: &TransportConfig,
) -> Result<Arc<dyn TransportAdapter>, BeaconError> {
    match cfg.endpoint.as_deref() {
        Some(endpoint) => Ok(Arc::new(HttpTransport::new(
            endpoint,
            cfg.api_token.as_deref(),
        )?)),
        None => Ok(Arc::new(DisabledTransport)),
    }
}
