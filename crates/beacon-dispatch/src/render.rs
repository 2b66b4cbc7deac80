// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text alert body forwarded to destination groups.

use std::fmt::Write;

use beacon_core::{Category, ClassificationResult, Message, Severity};

/// Longest excerpt of the original message included in an alert.
pub const MAX_EXCERPT_CHARS: usize = 600;

pub fn render_alert(
    message: &Message,
    classification: &ClassificationResult,
    category: &Category,
    severity: Severity,
    escalation_score: f64,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {} ({})",
        severity.to_string().to_uppercase(),
        category.name,
        category.department
    );

    let who = if message.sender_name == message.sender_id {
        message.sender_id.clone()
    } else {
        format!("{} ({})", message.sender_name, message.sender_id)
    };
    match &message.group_id {
        Some(group) => {
            let _ = writeln!(out, "From: {who} in {group}");
        }
        None => {
            let _ = writeln!(out, "From: {who}");
        }
    }

    let _ = writeln!(out, "\"{}\"", excerpt(&message.text));
    let _ = writeln!(
        out,
        "Sentiment: {} | Intent: {} | Confidence: {:.0}%",
        classification.sentiment,
        classification.intent,
        classification.confidence * 100.0
    );
    let _ = write!(
        out,
        "Escalation: {:.2} | {}",
        escalation_score,
        message.received_at.format("%Y-%m-%d %H:%M UTC")
    );
    out
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= MAX_EXCERPT_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
    cut.push_str("...");
    cut
}
