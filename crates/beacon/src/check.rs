// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `beacon check` command implementation.
//!
//! Verifies that the configuration is valid, that the database opens and
//! migrates, and that the analysis and transport collaborators answer
//! their health probes.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use beacon_config::model::BeaconConfig;
use beacon_core::BeaconError;
use beacon_engine::{ComponentHealth, Engine};

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn from_component(component: ComponentHealth, duration: Duration) -> Self {
        let status = match component.status {
            "healthy" => CheckStatus::Pass,
            "degraded" => CheckStatus::Warn,
            _ => CheckStatus::Fail,
        };
        Self {
            name: component.name,
            status,
            message: component
                .detail
                .unwrap_or_else(|| component.status.to_string()),
            duration,
        }
    }
}

pub async fn run_check(config: &BeaconConfig, plain: bool) -> Result<(), BeaconError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let results = collect(config).await;

    println!();
    println!("  beacon check");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let failures = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    let warnings = results
        .iter()
        .filter(|r| r.status == CheckStatus::Warn)
        .count();
    if failures + warnings == 0 {
        println!("  All checks passed.");
    } else {
        let issues = failures + warnings;
        let word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {word} found.");
    }
    println!();

    if failures > 0 {
        return Err(BeaconError::Internal(format!("{failures} check(s) failed")));
    }
    Ok(())
}

async fn collect(config: &BeaconConfig) -> Vec<CheckResult> {
    let mut results = vec![CheckResult {
        name: "configuration".into(),
        status: CheckStatus::Pass,
        message: format!(
            "{} categories, {} destinations",
            config.categories.len(),
            config.destinations.len()
        ),
        duration: Duration::ZERO,
    }];

    let start = Instant::now();
    let engine = match Engine::from_config(config.clone()).await {
        Ok(engine) => engine,
        Err(e) => {
            results.push(CheckResult {
                name: "engine".into(),
                status: CheckStatus::Fail,
                message: e.to_string(),
                duration: start.elapsed(),
            });
            return results;
        }
    };
    results.push(CheckResult {
        name: "engine".into(),
        status: CheckStatus::Pass,
        message: format!("database ready at {}", config.storage.database_path),
        duration: start.elapsed(),
    });

    let start = Instant::now();
    let components = engine.health().await;
    let elapsed = start.elapsed();
    results.extend(
        components
            .into_iter()
            .map(|c| CheckResult::from_component(c, elapsed)),
    );

    if config.gateway.enabled && config.gateway.bearer_token.as_deref().is_none_or(str::is_empty) {
        results.push(CheckResult {
            name: "gateway".into(),
            status: CheckStatus::Warn,
            message: "no bearer_token set; every /v1 request will be rejected".into(),
            duration: Duration::ZERO,
        });
    }
    results
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red()),
        };
        format!("    {symbol} {:<20} {message} ({ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!("    {tag} {:<20} {} ({ms}ms)", result.name, result.message)
    }
}
