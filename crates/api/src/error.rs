//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
///
/// Every response body carries a machine-distinguishable `code` next to the
/// human-readable `error` message.
#[derive(Debug)]
pub enum ApiError {
    /// No usable identity on the request.
    Unauthorized(String),
    /// Identity present but lacking the required role.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest { code: &'static str, message: String },
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "validation",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, &'static str, String) {
    match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::NoItems | OrderError::InvalidQuantity { .. } => {
                (StatusCode::BAD_REQUEST, "validation", err.to_string())
            }
            OrderError::InvalidAddress => {
                (StatusCode::BAD_REQUEST, "invalid_address", err.to_string())
            }
            OrderError::ProductUnavailable => (
                StatusCode::BAD_REQUEST,
                "product_unavailable",
                err.to_string(),
            ),
            OrderError::InsufficientStock { .. } => (
                StatusCode::BAD_REQUEST,
                "insufficient_stock",
                err.to_string(),
            ),
            OrderError::NotFound => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
            OrderError::Unauthorized => (StatusCode::FORBIDDEN, "forbidden", err.to_string()),
        },
        // A commit-time stock race rolled the whole order back; nothing was
        // persisted, so the caller gets a generic retryable failure rather
        // than a detailed stock report.
        DomainError::Store(StoreError::StockConflict { product_id }) => {
            tracing::warn!(%product_id, "order commit lost a stock race");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "order_failed",
                "Failed to create order".to_string(),
            )
        }
        DomainError::Store(store_err) => {
            tracing::error!(error = %store_err, "store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Domain(DomainError::Store(err))
    }
}
