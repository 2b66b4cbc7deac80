// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert delivery for Beacon.
//!
//! The [`Dispatcher`] sends each routing decision through the chat
//! transport, pacing sends per destination with a token bucket, retrying
//! transient failures with capped exponential backoff, and writing one
//! routing log entry per delivery through the [`AuditLog`].

pub mod audit;
pub mod dispatcher;
pub mod ratelimit;
pub mod render;

pub use audit::AuditLog;
pub use dispatcher::{
    Delivery, DeliveryContext, DeliveryOutcome, DeliveryStatus, Dispatcher, RetryPolicy,
};
pub use ratelimit::DestinationLimiter;
pub use render::render_alert;
