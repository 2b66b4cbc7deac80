// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Beacon integration tests.
//!
//! Provides mock collaborators and a harness that assembles a full engine
//! over a temporary database, so pipeline tests run without a network.
//!
//! # Components
//!
//! - [`MockAnalyzer`] - Scriptable analysis service
//! - [`MockTransport`] - Chat transport that records sends and replays scripted failures
//! - [`TestHarness`] - Engine with both mocks and temp storage

pub mod harness;
pub mod mock_analyzer;
pub mod mock_transport;

pub use harness::TestHarness;
pub use mock_analyzer::MockAnalyzer;
pub use mock_transport::{MockTransport, SentAlert};
