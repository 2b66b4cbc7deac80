// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod categories;
pub mod destinations;
pub mod messages;
pub mod routing_log;
pub mod rules;
pub mod senders;
pub mod settings;
