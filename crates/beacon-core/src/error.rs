// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Beacon routing engine.

use thiserror::Error;

use crate::types::{CategoryId, CategoryStatus};

/// The primary error type used across Beacon crates.
///
/// Only audit write failures and input validation failures are expected to
/// reach callers of the message pipeline; every other condition is folded
/// into a logged, queryable outcome.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Malformed input rejected at the engine boundary.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A category lifecycle action is not permitted from its current status.
    #[error("cannot {action} category {id} in status {from}")]
    InvalidTransition {
        id: CategoryId,
        from: CategoryStatus,
        action: &'static str,
    },

    /// A routing rule points at a category or destination that does not resolve.
    #[error("invalid rule reference: {0}")]
    InvalidRuleReference(String),

    /// The external analysis call failed or returned a malformed response.
    #[error("analysis error: {message}")]
    Analysis {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The chat transport could not be reached or configured.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The routing log write did not become durable.
    #[error("audit write failed: {message}")]
    AuditWrite {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BeaconError {
    /// Shorthand for a `NotFound` error with a displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BeaconError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
