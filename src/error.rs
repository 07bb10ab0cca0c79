//! Request-level error taxonomy.
//!
//! [`ApiError`] covers the expected terminal states of a request. Genuine
//! faults travel separately as [`ActionError::Fault`] and are turned into a
//! generic 500 at the pipeline boundary.

use axum::http::{header, StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::data::DataError;
use crate::pipeline::response::ApiResponse;
use crate::security::rate_limit::RateLimitDecision;

/// Why authorization failed. Both map to 403 with distinct messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForbiddenReason {
    NoRole,
    Denied {
        role: String,
        table: String,
        action: String,
    },
}

/// Expected early termination of a request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limit exceeded")]
    RateLimited(RateLimitDecision),

    /// Carries the authenticator's own unauthorized response.
    #[error("authentication required")]
    Unauthenticated(Box<ApiResponse>),

    #[error("forbidden: {0:?}")]
    Forbidden(ForbiddenReason),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("method {method} not allowed for action {action}")]
    MethodNotAllowed { action: String, method: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload too large")]
    PayloadTooLarge,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthenticated(response) => response.status,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidAction(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn into_response(self) -> ApiResponse {
        let status = self.status();
        match self {
            ApiError::RateLimited(decision) => {
                let mut response = ApiResponse::json(
                    status,
                    &json!({
                        "error": "Rate limit exceeded",
                        "message": format!(
                            "Too many requests. Limit is {} per {} seconds.",
                            decision.limit, decision.window_secs
                        ),
                        "retry_after": decision.reset_after_secs,
                        "reset_at": decision.reset_at,
                        "limit": decision.limit,
                        "window": decision.window_secs,
                    }),
                );
                response.set_header_name(header::RETRY_AFTER, decision.reset_after_secs);
                response.apply_rate_limit(&decision);
                response
            }
            ApiError::Unauthenticated(response) => *response,
            ApiError::Forbidden(ForbiddenReason::NoRole) => {
                ApiResponse::error(status, "Forbidden", "No role assigned to the current user")
            }
            ApiError::Forbidden(ForbiddenReason::Denied {
                role,
                table,
                action,
            }) => ApiResponse::error(
                status,
                "Forbidden",
                format!("Role '{role}' may not perform '{action}' on '{table}'"),
            ),
            ApiError::InvalidAction(action) if action.is_empty() => {
                ApiResponse::error(status, "Invalid action", "No action specified")
            }
            ApiError::InvalidAction(action) => {
                ApiResponse::error(status, "Invalid action", format!("Unknown action '{action}'"))
            }
            ApiError::MethodNotAllowed { action, method } => {
                let mut response = ApiResponse::error(
                    status,
                    "Method not allowed",
                    format!("Action '{action}' cannot be performed with {method}"),
                );
                response.set_header_name(header::ALLOW, "POST, PUT, PATCH, DELETE");
                response
            }
            ApiError::BadRequest(message) => ApiResponse::error(status, "Bad request", message),
            ApiError::NotFound(message) => ApiResponse::error(status, "Not found", message),
            ApiError::PayloadTooLarge => ApiResponse::error(
                status,
                "Payload too large",
                "Request body exceeds the configured limit",
            ),
        }
    }
}

/// Result channel of action handlers and pipeline stages.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Rejected(#[from] ApiError),

    /// A bug or backend failure. Never shown to the client.
    #[error("internal fault: {0}")]
    Fault(String),
}

impl From<DataError> for ActionError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::UnknownTable(table) => {
                ApiError::NotFound(format!("Table '{table}' does not exist")).into()
            }
            DataError::RowNotFound { table, id } => {
                ApiError::NotFound(format!("No record '{id}' in '{table}'")).into()
            }
            DataError::Invalid(message) => ApiError::BadRequest(message).into(),
            DataError::Backend(message) => ActionError::Fault(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_response_shape() {
        let response = ApiError::RateLimited(RateLimitDecision {
            allowed: false,
            limit: 5,
            request_count: 5,
            remaining: 0,
            window_secs: 60,
            reset_after_secs: 42,
            reset_at: 1_700_000_042,
        })
        .into_response();

        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.header_str("retry-after"), Some("42"));
        assert_eq!(response.header_str("x-ratelimit-remaining"), Some("0"));
        let body = response.body_json().unwrap();
        assert_eq!(body["retry_after"], 42);
        assert_eq!(body["reset_at"], 1_700_000_042u64);
        assert_eq!(body["limit"], 5);
        assert_eq!(body["window"], 60);
        assert!(body["error"].is_string());
        assert!(body["message"].is_string());
    }

    #[test]
    fn test_forbidden_messages_differ() {
        let no_role = ApiError::Forbidden(ForbiddenReason::NoRole).into_response();
        let denied = ApiError::Forbidden(ForbiddenReason::Denied {
            role: "clerk".into(),
            table: "orders".into(),
            action: "delete".into(),
        })
        .into_response();

        assert_eq!(no_role.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_ne!(
            no_role.body_json().unwrap()["message"],
            denied.body_json().unwrap()["message"]
        );
    }

    #[test]
    fn test_data_errors_map_to_statuses() {
        let not_found: ActionError = DataError::UnknownTable("ghost".into()).into();
        assert!(matches!(not_found, ActionError::Rejected(ApiError::NotFound(_))));

        let invalid: ActionError = DataError::Invalid("bad".into()).into();
        assert!(matches!(invalid, ActionError::Rejected(ApiError::BadRequest(_))));

        let fault: ActionError = DataError::Backend("connection reset".into()).into();
        assert!(matches!(fault, ActionError::Fault(_)));
    }
}
