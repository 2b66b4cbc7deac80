// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Counters go through the metrics facade; whichever recorder the host
//! installs collects them.

use beacon_core::MessageOutcome;
use metrics::{describe_counter, describe_histogram};

/// Register descriptions for every Beacon metric.
///
/// Call once at startup after a recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "beacon_messages_processed_total",
        "Messages that finished the pipeline, by outcome"
    );
    describe_counter!(
        "beacon_deliveries_total",
        "Routing decisions delivered, failed, cancelled, or skipped as duplicates"
    );
    describe_counter!(
        "beacon_delivery_retries_total",
        "Transport retries after transient failures"
    );
    describe_counter!(
        "beacon_audit_writes_total",
        "Routing log writes, by result"
    );
    describe_counter!(
        "beacon_detector_runs_total",
        "Dynamic category detection passes, by result"
    );
    describe_histogram!(
        "beacon_pipeline_seconds",
        "Time from dequeue to recorded outcome"
    );
}

pub fn record_processed(outcome: MessageOutcome) {
    metrics::counter!("beacon_messages_processed_total", "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_pipeline_latency(seconds: f64) {
    metrics::histogram!("beacon_pipeline_seconds").record(seconds);
}
