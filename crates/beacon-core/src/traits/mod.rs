// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for Beacon's external collaborators.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod analysis;
pub mod transport;

pub use adapter::PluginAdapter;
pub use analysis::AnalysisAdapter;
pub use transport::{SendError, TransportAdapter};
