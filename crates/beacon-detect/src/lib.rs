// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dynamic category detection for Beacon.
//!
//! Unmatched messages accumulate in the pool (the `messages` table, outcome
//! `unmatched`, not yet absorbed). A detection pass clusters the pool by
//! token overlap and, for every cluster large enough, either folds it into
//! a pending or approved category with an overlapping keyword set or
//! surfaces a new pending candidate. Absorbed messages leave the pool, so a
//! second pass over an unchanged pool changes nothing.

pub mod cluster;
pub mod detector;

pub use cluster::{Cluster, PoolEntry};
pub use detector::{DetectionReport, Detector, DetectorSettings, RunOutcome};
