// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Beacon routing engine.
//!
//! WAL-mode SQLite with embedded migrations. Every statement runs on the
//! single background thread owned by `tokio-rusqlite`, so writers never
//! contend for the database lock.

pub mod codec;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
