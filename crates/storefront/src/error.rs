//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses carry a JSON body `{"error_kind", "message"}` (plus `"fields"`
//! for shipping validation) so the UI can branch on the kind without parsing
//! prose.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::checkout::{CheckoutError, FinalizeError};
use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout transition rejected.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Order finalization failed.
    #[error("Finalize error: {0}")]
    Finalize(#[from] FinalizeError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Shopper is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this is a server-side failure worth reporting to Sentry.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) => true,
            Self::Finalize(FinalizeError::Store(_)) => true,
            Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash) => true,
            _ => false,
        }
    }

    /// Stable machine-readable kind for the response body.
    fn kind(&self) -> &'static str {
        match self {
            Self::Database(RepositoryError::Conflict(_)) => "conflict",
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => "not_found",
            Self::Database(_) | Self::Internal(_) => "internal",
            Self::Auth(_) => "auth",
            Self::Checkout(CheckoutError::InvalidShipping(_)) => "validation",
            Self::Checkout(CheckoutError::EmptyCart)
            | Self::Finalize(FinalizeError::EmptyCart) => "empty_cart",
            Self::Checkout(CheckoutError::IllegalTransition { .. }) => "illegal_transition",
            Self::Finalize(FinalizeError::IdentityConflict) => "identity_conflict",
            Self::Finalize(FinalizeError::AlreadyInFlight) => "in_progress",
            Self::Finalize(_) => "finalization",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(err) => match err {
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::AccountAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::InvalidShipping(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::IllegalTransition { .. } | CheckoutError::EmptyCart => {
                    StatusCode::CONFLICT
                }
            },
            Self::Finalize(err) => match err {
                FinalizeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::CONFLICT,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::AccountAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            Self::Checkout(CheckoutError::InvalidShipping(_)) => {
                "Please correct the highlighted fields".to_string()
            }
            Self::Finalize(err) => match err {
                FinalizeError::IdentityConflict => {
                    "An account with this email already exists, please log in".to_string()
                }
                FinalizeError::AlreadyInFlight => {
                    "Your order is already being placed".to_string()
                }
                FinalizeError::EmptyCart => "Your cart is empty".to_string(),
                _ => "Order could not be placed, please try again".to_string(),
            },
            _ => self.to_string(),
        };

        let mut body = json!({
            "error_kind": self.kind(),
            "message": message,
        });

        // Field-level messages ride along for the shipping form
        if let Self::Checkout(CheckoutError::InvalidShipping(fields)) = &self
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("fields".to_string(), json!(fields));
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an account ID.
///
/// Call this after successful authentication to associate errors with accounts.
pub fn set_sentry_user(account_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the shopper.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order-123".to_string());
        assert_eq!(err.to_string(), "Not found: order-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Finalize(FinalizeError::IdentityConflict)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Finalize(FinalizeError::AlreadyInFlight)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_kind_stability() {
        assert_eq!(
            AppError::Finalize(FinalizeError::IdentityConflict).kind(),
            "identity_conflict"
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::EmptyCart).kind(),
            "empty_cart"
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::InvalidShipping(Vec::new())).kind(),
            "validation"
        );
    }
}
