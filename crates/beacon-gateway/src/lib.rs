// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface of the Beacon engine.
//!
//! Exposes message ingestion and the administration and query services to
//! the dashboard backend. Everything under `/v1` sits behind a bearer
//! token; `/health` is open for supervisors and load balancers.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{GatewayState, ServerConfig, router, start_server};
