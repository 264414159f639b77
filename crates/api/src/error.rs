//! Unified error handling for the API.
//!
//! Every error renders as `{"error": "<message>"}` with a matching status.
//! Server-side failures are reported to Sentry and replaced with a generic
//! message.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use dropship_core::commission::CommissionError;

use crate::db::RepositoryError;
use crate::services::{ApiKeyError, DistributionError, OrderError, WalletError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Well-formed request that breaks a business rule.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request body over the size limit.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Caller exceeded the rate limit.
    #[error("Too many requests")]
    TooManyRequests { retry_after_secs: u64 },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the caller.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => format!("Conflict: {msg}"),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        let retry_after = match &self {
            Self::TooManyRequests { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let mut response = (status, Json(json!({ "error": self.public_message() }))).into_response();

        if let Some(secs) = retry_after
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }

        response
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Invalid(_)
            | OrderError::ProductUnavailable(_)
            | OrderError::InsufficientStock { .. } => Self::Unprocessable(e.to_string()),
            OrderError::NotFound => Self::NotFound(e.to_string()),
            OrderError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            OrderError::Distribution(inner) => inner.into(),
            OrderError::Repository(inner) => inner.into(),
        }
    }
}

impl From<DistributionError> for AppError {
    fn from(e: DistributionError) -> Self {
        match e {
            DistributionError::OrderNotFound => Self::NotFound(e.to_string()),
            DistributionError::NotDelivered(_) => Self::Conflict(e.to_string()),
            // Stored rates are operator data; treat bad ones as a server fault.
            DistributionError::Rates(inner) => Self::Internal(inner.to_string()),
            DistributionError::Repository(inner) => inner.into(),
        }
    }
}

impl From<WalletError> for AppError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InvalidAmount(_) | WalletError::InsufficientFunds { .. } => {
                Self::Unprocessable(e.to_string())
            }
            WalletError::UserNotFound => Self::NotFound(e.to_string()),
            WalletError::Repository(inner) => inner.into(),
        }
    }
}

impl From<ApiKeyError> for AppError {
    fn from(e: ApiKeyError) -> Self {
        match e {
            ApiKeyError::Invalid(_) | ApiKeyError::NotDropshipper => Self::Unprocessable(e.to_string()),
            ApiKeyError::UserNotFound | ApiKeyError::NotFound => Self::NotFound(e.to_string()),
            ApiKeyError::Repository(inner) => inner.into(),
        }
    }
}

impl From<CommissionError> for AppError {
    fn from(e: CommissionError) -> Self {
        Self::Unprocessable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use dropship_core::{Money, OrderStatus, ProductId};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 123".to_string());
        assert_eq!(err.to_string(), "Not found: order 123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(AppError::Unprocessable("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(get_status(AppError::PayloadTooLarge), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_by_kind() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("dup".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::DataCorruption("bad".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_too_many_requests_sets_retry_after() {
        let response = AppError::TooManyRequests { retry_after_secs: 7 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("7")
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption("secret detail".into()));
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_service_errors_map_to_statuses() {
        let order_err = OrderError::InsufficientStock {
            product_id: ProductId::new(3),
            available: 1,
        };
        assert_eq!(get_status(order_err.into()), StatusCode::UNPROCESSABLE_ENTITY);

        let transition = OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        assert_eq!(get_status(transition.into()), StatusCode::CONFLICT);

        let wallet_err = WalletError::InsufficientFunds {
            balance: Money::ZERO,
        };
        assert_eq!(get_status(wallet_err.into()), StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(get_status(ApiKeyError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(DistributionError::NotDelivered(OrderStatus::Shipped).into()),
            StatusCode::CONFLICT
        );
    }
}
