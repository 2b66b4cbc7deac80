// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the analysis endpoint and the chat bridge.

use serde::{Deserialize, Serialize};

/// Body posted to the analysis endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest<'a> {
    pub text: &'a str,
    pub sender_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<&'a str>,
}

/// Body returned by the analysis endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResponse {
    pub sentiment: String,
    pub intent: String,
    pub confidence: f64,
    #[serde(default)]
    pub entities: Vec<WireEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireEntity {
    pub text: String,
    #[serde(alias = "label", alias = "type")]
    pub category: String,
}

/// Body posted to `<bridge>/send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendRequest<'a> {
    pub group_id: &'a str,
    pub text: &'a str,
}
