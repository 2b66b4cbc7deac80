// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transport adapter trait for forwarding alerts to destination groups.

use async_trait::async_trait;
use thiserror::Error;

use crate::traits::adapter::PluginAdapter;

/// Failure reported by a transport send.
///
/// The dispatcher retries `Transient` failures and records `Permanent`
/// ones immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Connectivity problems, throttling, or server-side hiccups.
    #[error("transient: {0}")]
    Transient(String),
    /// Destination missing, bot removed from the group, or a rejected payload.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl SendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SendError::Transient(_))
    }

    /// The transport's description of the failure.
    pub fn message(&self) -> &str {
        match self {
            SendError::Transient(m) | SendError::Permanent(m) => m,
        }
    }
}

/// Adapter for the external chat-send capability.
#[async_trait]
pub trait TransportAdapter: PluginAdapter {
    /// Send `text` to the group identified by `destination_group_id`.
    async fn send(&self, destination_group_id: &str, text: &str) -> Result<(), SendError>;
}
