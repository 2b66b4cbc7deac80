// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from engine errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use beacon_core::BeaconError;
use serde::Serialize;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`BeaconError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub BeaconError);

impl From<BeaconError> for ApiError {
    fn from(e: BeaconError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BeaconError::Validation(_) | BeaconError::Config(_) => StatusCode::BAD_REQUEST,
            BeaconError::InvalidRuleReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BeaconError::NotFound { .. } => StatusCode::NOT_FOUND,
            BeaconError::InvalidTransition { .. } => StatusCode::CONFLICT,
            BeaconError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            BeaconError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            BeaconError::Analysis { .. } | BeaconError::Transport { .. } => {
                StatusCode::BAD_GATEWAY
            }
            BeaconError::Storage { .. }
            | BeaconError::AuditWrite { .. }
            | BeaconError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::CategoryStatus;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (BeaconError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (BeaconError::not_found("rule", 4), StatusCode::NOT_FOUND),
            (
                BeaconError::InvalidTransition {
                    id: 1,
                    from: CategoryStatus::Rejected,
                    action: "approve",
                },
                StatusCode::CONFLICT,
            ),
            (
                BeaconError::InvalidRuleReference("gone".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (BeaconError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
