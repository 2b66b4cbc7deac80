// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column encodings shared by the query modules.

use std::collections::BTreeSet;
use std::str::FromStr;

use beacon_core::Severity;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;

/// ISO-8601 UTC with millisecond precision, e.g. `2026-03-01T09:15:02.120Z`.
pub fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

/// Parse a strum-backed enum column.
pub fn parse_enum<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(raw).map_err(|e| conversion_err(idx, e))
}

pub fn to_json<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub fn from_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| conversion_err(idx, e))
}

/// Severity sets are stored as a sorted comma list, e.g. `medium,high`.
pub fn encode_severities(set: &BTreeSet<Severity>) -> String {
    set.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_severities(idx: usize, raw: &str) -> rusqlite::Result<BTreeSet<Severity>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_enum(idx, s))
        .collect()
}
