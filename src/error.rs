//! Service error taxonomy and its mapping onto HTTP responses
//!
//! Validation and authorization failures carry a user-facing message.
//! Integration and database failures are logged here and surface only a
//! generic message, so gateway internals never leak to callers.

use axum::{http::StatusCode, Json};
use sea_orm::DbErr;

use crate::models::common::ErrorResponse;
use crate::services::gateway::GatewayError;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug)]
pub enum ServiceError {
    /// Bad input: dates, unavailable bed, malformed proof
    Validation(String),
    NotFound(String),
    /// No identity attached to the request
    Unauthenticated,
    /// Identity known but not allowed here
    Forbidden(String),
    /// Action locked until the commission is settled
    PaymentRequired(String),
    Configuration(String),
    Gateway(String),
    InvalidWebhook(String),
    Database(DbErr),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ServiceError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ServiceError::Unauthenticated => write!(f, "Authentication required"),
            ServiceError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ServiceError::PaymentRequired(msg) => write!(f, "Payment required: {}", msg),
            ServiceError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ServiceError::Gateway(msg) => write!(f, "Payment gateway error: {}", msg),
            ServiceError::InvalidWebhook(msg) => write!(f, "Invalid webhook: {}", msg),
            ServiceError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        ServiceError::Database(err)
    }
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Configuration(msg) => ServiceError::Configuration(msg),
            other => ServiceError::Gateway(other.to_string()),
        }
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ServiceError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Unauthenticated => "UNAUTHENTICATED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::PaymentRequired(_) => "PAYMENT_REQUIRED",
            ServiceError::Configuration(_) => "CONFIG_ERROR",
            ServiceError::Gateway(_) => "GATEWAY_ERROR",
            ServiceError::InvalidWebhook(_) => "INVALID_WEBHOOK",
            ServiceError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Message safe to show to the caller
    fn public_message(&self) -> String {
        match self {
            ServiceError::Validation(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::Forbidden(msg)
            | ServiceError::PaymentRequired(msg)
            | ServiceError::InvalidWebhook(msg) => msg.clone(),
            ServiceError::Unauthenticated => "Authentication required".to_string(),
            ServiceError::Configuration(_) => "Server configuration error".to_string(),
            ServiceError::Gateway(_) => "Payment provider unavailable, please try again".to_string(),
            ServiceError::Database(_) => "Internal server error".to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(error = %err, code = err.code(), "Request failed");
        } else {
            tracing::debug!(error = %err, code = err.code(), "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: err.public_message(),
                code: Some(err.code().to_string()),
                order_id: None,
            }),
        )
    }
}
