// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing rule evaluation.

use beacon_core::{Category, RoutingDecision, RoutingRule, Severity};
use tracing::debug;

use crate::catalog::RoutingSnapshot;

/// Why a rule for the matched category did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    RuleInactive,
    /// Destination deleted or never registered.
    DestinationMissing,
    DestinationInactive,
    SeverityFiltered,
}

/// Check one rule against the matched category and severity.
pub fn qualifies(
    rule: &RoutingRule,
    snapshot: &RoutingSnapshot,
    severity: Severity,
) -> Result<(), Skip> {
    if !rule.is_active {
        return Err(Skip::RuleInactive);
    }
    match snapshot.destinations.get(&rule.destination_group_id) {
        None => return Err(Skip::DestinationMissing),
        Some(d) if !d.is_active => return Err(Skip::DestinationInactive),
        Some(_) => {}
    }
    if !rule.severity_filter.contains(&severity) {
        return Err(Skip::SeverityFiltered);
    }
    Ok(())
}

/// Every rule that fires for a message matched to `category` at `severity`,
/// ordered by priority then rule id.
///
/// Unmatched messages never reach this point; routing requires a category.
pub fn evaluate(
    snapshot: &RoutingSnapshot,
    category: &Category,
    severity: Severity,
) -> Vec<RoutingDecision> {
    snapshot
        .rules
        .iter()
        .filter(|rule| rule.category_id == category.id)
        .filter_map(|rule| match qualifies(rule, snapshot, severity) {
            Ok(()) => Some(RoutingDecision {
                rule_id: rule.id,
                category_id: category.id,
                destination_group_id: rule.destination_group_id.clone(),
                severity,
                priority: rule.priority,
            }),
            Err(skip) => {
                debug!(
                    rule_id = rule.id,
                    destination = %rule.destination_group_id,
                    reason = ?skip,
                    "rule skipped"
                );
                None
            }
        })
        .collect()
}
