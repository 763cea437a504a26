//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-class errors to
//! Sentry before responding with the uniform JSON envelope. All route
//! handlers return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use spindle_core::AlbumId;

use crate::db::RepositoryError;
use crate::db::stock::StockError;
use crate::response::{ApiResponse, FieldError};
use crate::services::checkout::CheckoutError;
use crate::services::flow::FlowError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input, recoverable client-side.
    #[error("Validation error")]
    Validation(Vec<FieldError>),

    /// Resource not found (also covers cart lines owned by someone else).
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Ownership violation on an existing resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Stock exhausted for a specific album; the cart can be edited and retried.
    #[error("Album {0} is out of stock")]
    OutOfStock(AlbumId),

    /// Checkout attempted with nothing to order.
    #[error("Cart is empty")]
    EmptyCart,

    /// Checkout wizard action not valid at the current step.
    #[error("{0}")]
    Flow(String),

    /// Stock was committed but the order could not be persisted.
    #[error("Persistence inconsistency: {0}")]
    Inconsistency(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => Self::EmptyCart,
            CheckoutError::OutOfStock(album_id) => Self::OutOfStock(album_id),
            CheckoutError::Stock(StockError::NotFound(album_id)) => {
                Self::NotFound(format!("album {album_id}"))
            }
            CheckoutError::Stock(StockError::InvalidQuantity(_)) => Self::Validation(vec![
                FieldError::new("quantity", "Quantity must be at least 1"),
            ]),
            CheckoutError::Stock(other) => Self::Internal(other.to_string()),
            CheckoutError::Inconsistency(source) => Self::Inconsistency(source.to_string()),
            CheckoutError::Repository(err) => Self::Database(err),
        }
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Invalid(errors) => Self::Validation(errors),
            wrong_step @ FlowError::WrongStep { .. } => Self::Flow(wrong_step.to_string()),
        }
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::OutOfStock(_) | Self::Flow(_) => StatusCode::CONFLICT,
            Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Inconsistency(_)
            | Self::Database(_)
            | Self::Session(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error should be reported to Sentry.
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Inconsistency(_) | Self::Internal(_) | Self::Session(_) | Self::Database(_)
        ) && !matches!(self, Self::Database(RepositoryError::NotFound))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry with full detail.
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients.
        let (message, errors) = match self {
            Self::Validation(errors) => ("Validation error".to_owned(), Some(errors)),
            Self::Database(RepositoryError::NotFound) => ("Resource not found".to_owned(), None),
            Self::Inconsistency(_) | Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                ("Internal server error".to_owned(), None)
            }
            other => (other.to_string(), None),
        };

        (status, Json(ApiResponse::failure(message, errors))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
