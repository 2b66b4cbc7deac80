// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Category lifecycle state machine.
//!
//! Transitions are a pure function of the current status and the requested
//! action. Rejected and merged are terminal; only merge carries a target.

use crate::error::BeaconError;
use crate::types::{CategoryId, CategoryStatus};

/// An administrator action on a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryAction {
    Approve,
    Reject,
    Merge { target: CategoryId },
}

impl CategoryAction {
    /// Verb used in error messages and the transition history.
    pub fn verb(&self) -> &'static str {
        match self {
            CategoryAction::Approve => "approve",
            CategoryAction::Reject => "reject",
            CategoryAction::Merge { .. } => "merge",
        }
    }
}

/// Compute the status a category moves to, or reject the action.
///
/// Merge target validity (exists, approved, no cycle) depends on other rows
/// and is checked by the caller; this function only rules out self-merge.
pub fn transition(
    id: CategoryId,
    from: CategoryStatus,
    action: CategoryAction,
) -> Result<CategoryStatus, BeaconError> {
    use CategoryAction as A;
    use CategoryStatus as S;

    match (from, action) {
        (_, A::Merge { target }) if target == id => Err(BeaconError::Validation(format!(
            "category {id} cannot be merged into itself"
        ))),
        (S::Pending, A::Approve) => Ok(S::Approved),
        (S::Pending, A::Reject) => Ok(S::Rejected),
        (S::Pending | S::Approved, A::Merge { .. }) => Ok(S::Merged),
        (from, action) => Err(BeaconError::InvalidTransition {
            id,
            from,
            action: action.verb(),
        }),
    }
}
