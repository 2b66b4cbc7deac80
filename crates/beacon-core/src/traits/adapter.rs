// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all collaborator adapters must implement.

use async_trait::async_trait;

use crate::error::BeaconError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for all Beacon adapters.
///
/// Provides identity and a health probe used by `beacon check` and the
/// gateway's health endpoint.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the kind of collaborator this adapter fronts.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, BeaconError>;
}
