//! HTTP error mapping.
//!
//! Every failure leaves the service as `{"error": "<message>"}` with the
//! status code the game client already expects.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bhv_core::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input; also used for clone conflicts.
    #[error("{0}")]
    BadRequest(String),

    /// Referenced profile or behavior does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Something failed inside the service.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Map a store error for the sweep endpoints, which report an absent
    /// profile as 400 rather than 404.
    #[must_use]
    pub fn invalid_profile(err: StoreError) -> Self {
        match err {
            StoreError::Validation(_) | StoreError::ProfileNotFound(_) => {
                Self::BadRequest("Invalid or missing profile".into())
            }
            other => other.into(),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(_) | StoreError::ProfileExists(_) => {
                Self::BadRequest(err.to_string())
            }
            StoreError::ProfileNotFound(_) | StoreError::BehaviorNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            StoreError::Serialization(_) | StoreError::Config(_) | StoreError::Io(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_client_statuses() {
        let cases = [
            (StoreError::Validation("profile"), StatusCode::BAD_REQUEST),
            (StoreError::ProfileExists("B".into()), StatusCode::BAD_REQUEST),
            (StoreError::ProfileNotFound("A".into()), StatusCode::NOT_FOUND),
            (
                StoreError::BehaviorNotFound {
                    profile: "A".into(),
                    id: "x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (StoreError::Config("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn sweep_endpoints_report_absent_profile_as_bad_request() {
        let err = ApiError::invalid_profile(StoreError::ProfileNotFound("A".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid or missing profile");
    }
}
