//! Error types for the webhook delivery system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Webhook system error variants.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid endpoint address: {0}")]
    InvalidAddress(String),

    #[error("Endpoint not found")]
    EndpointNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON error response returned by the management API.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            WebhookError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            WebhookError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "invalid_address"),
            WebhookError::EndpointNotFound => (StatusCode::NOT_FOUND, "endpoint_not_found"),
            WebhookError::MessageNotFound => (StatusCode::NOT_FOUND, "message_not_found"),
            WebhookError::InvalidSigningKey(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "signing_key_error")
            }
            WebhookError::DeliveryFailed(_) => (StatusCode::BAD_GATEWAY, "delivery_failed"),
            WebhookError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            WebhookError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, WebhookError>;
