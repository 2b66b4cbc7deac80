// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Analysis adapter trait for sentiment/intent/entity classification.

use async_trait::async_trait;

use crate::error::BeaconError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ClassificationResult, Message};

/// Adapter for the external analysis call.
///
/// Implementations report failures as errors; the classifier stage owns the
/// timeout and the deterministic fallback.
#[async_trait]
pub trait AnalysisAdapter: PluginAdapter {
    /// Analyze one message.
    async fn analyze(&self, message: &Message) -> Result<ClassificationResult, BeaconError>;
}
