// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification, category matching, and rule evaluation for Beacon.
//!
//! This crate provides:
//! - [`LexiconAnalyzer`]: heuristic analysis used when no endpoint is configured
//! - [`Classifier`]: timeout-bounded analysis with a deterministic fallback
//! - [`CategoryMatcher`]: per-category threshold matching with stable tie-breaks
//! - [`rules::evaluate`]: fan-out of a matched message to every qualifying rule
//! - [`Catalog`]: consistent snapshots of categories and routing state

pub mod catalog;
pub mod classifier;
pub mod lexicon;
pub mod matcher;
pub mod rules;

pub use catalog::{Catalog, CategoryProfile, CategorySnapshot, RoutingSnapshot};
pub use classifier::{Classification, Classifier};
pub use lexicon::LexiconAnalyzer;
pub use matcher::{CategoryMatcher, MatchOutcome, MatchWeights};
