use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::storage::StoreError;

/// Message returned to the form when a required field is missing.
pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: name, email, phone";

/// Application-specific error types.
///
/// Externally only two classes exist: validation failures (400) and
/// everything else (500). `MethodNotAllowed` is routing, not handling.
#[derive(Debug)]
pub enum AppError {
    /// A required lead field was absent or empty.
    Validation(String),
    /// The request used a method the endpoint does not serve.
    MethodNotAllowed,
    /// No storage connection is configured for this process.
    StorageNotConfigured,
    /// The request body could not be decoded as a lead submission.
    InvalidBody(String),
    /// Creating (or confirming) the lead table failed.
    TableProvisioning(StoreError),
    /// Writing the lead record failed.
    Storage(StoreError),
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::MethodNotAllowed => write!(f, "Method not allowed"),
            AppError::StorageNotConfigured => {
                write!(f, "Azure Storage connection string not configured")
            }
            AppError::InvalidBody(msg) => write!(f, "Invalid request body: {}", msg),
            AppError::TableProvisioning(e) => write!(f, "Table provisioning failed: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Fixed, non-sensitive category reported in the `details` field of 500 responses.
    ///
    /// `None` for the variants answered outside the 500 class.
    fn details(&self) -> Option<&'static str> {
        match self {
            AppError::StorageNotConfigured => Some("Storage not configured"),
            AppError::InvalidBody(_) => Some("Invalid request body"),
            AppError::TableProvisioning(_) => Some("Failed to prepare lead table"),
            AppError::Storage(_) => Some("Failed to store lead"),
            AppError::Validation(_) | AppError::MethodNotAllowed => None,
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Internal failures are logged with their full detail; the caller only
    /// sees a generic message plus a category.
    fn into_response(self) -> Response {
        match &self {
            AppError::Validation(msg) => {
                tracing::warn!("Rejected lead submission: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "success": false,
                        "error": msg,
                    })),
                )
                    .into_response()
            }
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({
                    "success": false,
                    "error": "Method not allowed",
                })),
            )
                .into_response(),
            AppError::StorageNotConfigured
            | AppError::InvalidBody(_)
            | AppError::TableProvisioning(_)
            | AppError::Storage(_) => {
                tracing::error!(error = %self, "Error processing POST request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Internal server error",
                        "details": self.details(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    /// Converts a body decoding error into an `AppError`.
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidBody(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_details_never_echo_source_text() {
        let err = AppError::Storage(StoreError::Transport(
            "connection refused: secret-host.example".to_string(),
        ));
        assert_eq!(err.details(), Some("Failed to store lead"));
        assert!(err.to_string().contains("secret-host"));
    }

    #[test]
    fn test_client_facing_variants_have_no_details() {
        assert!(AppError::Validation(MISSING_FIELDS_MESSAGE.to_string())
            .details()
            .is_none());
        assert!(AppError::MethodNotAllowed.details().is_none());
        assert!(AppError::StorageNotConfigured.details().is_some());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation(MISSING_FIELDS_MESSAGE.to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::MethodNotAllowed.into_response().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            AppError::StorageNotConfigured.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::InvalidBody("eof".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
