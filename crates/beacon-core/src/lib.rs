// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Beacon message routing engine.
//!
//! This crate provides the domain records shared by every pipeline stage
//! (messages, classifications, categories, sender profiles, routing rules,
//! and routing log entries), the crate-wide error type, the adapter traits
//! for the two external collaborators (analysis and chat transport), and
//! the token-set helpers used by matching, detection, and repetition checks.

pub mod category;
pub mod error;
pub mod text;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use category::{transition, CategoryAction};
pub use error::BeaconError;
pub use types::{
    AdapterType, Category, CategoryId, CategoryOrigin, CategoryStatus, ClassificationResult,
    DestinationGroup, Entity, HealthStatus, InboundMessage, Message, MessageOutcome, RiskLevel,
    RoutingDecision, RoutingLogEntry, RoutingRule, RuleDraft, RuleId, SenderProfile, Sentiment,
    Severity, SeverityBands,
};

// Re-export all adapter traits at crate root.
pub use traits::{AnalysisAdapter, PluginAdapter, SendError, TransportAdapter};
