//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from signsecure-state, signsecure-core and the
//! notification layer to HTTP status codes with a JSON body of the form
//! `{ "error": { "code", "message", "details"? } }`.
//!
//! | Variant              | Status | Code                   |
//! |----------------------|--------|------------------------|
//! | `NotFound`           | 404    | `NOT_FOUND`            |
//! | `InvalidTransition`  | 400    | `VALIDATION_ERROR`     |
//! | `Validation`         | 422    | `VALIDATION_ERROR`     |
//! | `Unauthorized`       | 401    | `UNAUTHORIZED`         |
//! | `InvalidSigningLink` | 401    | `INVALID_SIGNING_LINK` |
//! | `DeliveryFailed`     | 502    | `DELIVERY_FAILED`      |
//! | `Internal`           | 500    | `INTERNAL_ERROR`       |
//!
//! Authorization denials are reported as `NotFound` so that the existence of
//! other users' records is never revealed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use signsecure_state::{DocumentError, FieldError, LifecycleError, SignerError};

use crate::notify::DeliveryError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found, or not visible to the caller (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Lifecycle rule violated, e.g. sending a non-draft document (400).
    #[error("{0}")]
    InvalidTransition(String),

    /// Request body malformed or failing field validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid platform credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Signer token rejected. The reason is never disclosed (401).
    #[error("invalid or expired signing link")]
    InvalidSigningLink,

    /// Invitation delivery failed after state was committed (502).
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::InvalidTransition(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::InvalidSigningLink => (StatusCode::UNAUTHORIZED, "INVALID_SIGNING_LINK"),
            Self::DeliveryFailed(_) => (StatusCode::BAD_GATEWAY, "DELIVERY_FAILED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// The status this error maps to.
    pub fn status(&self) -> StatusCode {
        self.status_and_code().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::DeliveryFailed(_) => tracing::warn!(error = %self, "invitation delivery failed"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<signsecure_core::CoreError> for AppError {
    fn from(err: signsecure_core::CoreError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::InvalidInput { .. } | DocumentError::UnknownStatus(_) => {
                Self::Validation(err.to_string())
            }
            DocumentError::InvalidTransition {
                to: signsecure_state::DocumentStatus::Sent,
                ..
            } => Self::InvalidTransition(
                "only draft documents can be sent for signature".to_string(),
            ),
            DocumentError::InvalidTransition { .. }
            | DocumentError::NoSigners
            | DocumentError::Deleted
            | DocumentError::NotEditable { .. } => Self::InvalidTransition(err.to_string()),
        }
    }
}

impl From<SignerError> for AppError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::AlreadySigned => {
                Self::InvalidTransition("document already signed".to_string())
            }
            SignerError::Deleted => Self::InvalidTransition(err.to_string()),
            SignerError::InvalidInput { .. } | SignerError::UnknownStatus(_) => {
                Self::Validation(err.to_string())
            }
        }
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        match err {
            FieldError::Required { .. } | FieldError::NotAssigned { .. } => {
                Self::InvalidTransition(err.to_string())
            }
            FieldError::InvalidGeometry(_)
            | FieldError::LabelTooLong
            | FieldError::UnknownType(_) => Self::Validation(err.to_string()),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Document(e) => e.into(),
            LifecycleError::Signer(e) => e.into(),
            LifecycleError::Field(e) => e.into(),
            LifecycleError::SignerNotOnDocument(_) => Self::NotFound("signer".to_string()),
            LifecycleError::DocumentNotSent { .. } | LifecycleError::UnknownField(_) => {
                Self::InvalidTransition(err.to_string())
            }
        }
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        Self::DeliveryFailed(err.to_string())
    }
}

impl From<signsecure_crypto::TokenError> for AppError {
    fn from(err: signsecure_crypto::TokenError) -> Self {
        Self::Internal(format!("token issuance failed: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("database error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use signsecure_state::DocumentStatus;

    #[test]
    fn transition_maps_to_400_validation_error() {
        let err = AppError::from(DocumentError::InvalidTransition {
            from: DocumentStatus::Sent,
            to: DocumentStatus::Sent,
        });
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"));
        assert!(err.to_string().contains("only draft documents"));
    }

    #[test]
    fn already_signed_maps_to_400() {
        let err = AppError::from(LifecycleError::Signer(SignerError::AlreadySigned));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn input_errors_map_to_422() {
        let err = AppError::from(FieldError::InvalidGeometry("width".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let err = AppError::from(signsecure_core::CoreError::InvalidTimestamp("x".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn signing_link_and_delivery_codes() {
        assert_eq!(
            AppError::InvalidSigningLink.status_and_code(),
            (StatusCode::UNAUTHORIZED, "INVALID_SIGNING_LINK")
        );
        assert_eq!(
            AppError::DeliveryFailed("smtp down".into()).status_and_code(),
            (StatusCode::BAD_GATEWAY, "DELIVERY_FAILED")
        );
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let response = AppError::Internal("password=hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("hunter2"));
    }

    #[tokio::test]
    async fn client_error_body_shape() {
        let response = AppError::NotFound("document".into()).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert!(json["error"].get("details").is_none());
    }
}
