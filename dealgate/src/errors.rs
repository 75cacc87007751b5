use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

use crate::store::StoreError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the presented
    /// credential could not be tied to a user
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Login failed. Deliberately identical for an unknown username and a
    /// wrong password, so callers cannot enumerate accounts
    #[error("invalid username or password")]
    InvalidCredential,

    /// The presented access or refresh token is unknown, expired, revoked,
    /// or already rotated
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    /// The client_id does not resolve in the client registry
    #[error("unknown client {id:?}")]
    UnknownClient { id: String },

    /// Authenticated user lacks the required role
    #[error("admin access required for {resource}")]
    InsufficientPermissions { resource: String },

    /// An admin account already exists; bootstrap is a one-time operation
    #[error("admin account already exists")]
    AdminAlreadyExists,

    /// Registration with a username that is already in use
    #[error("username {username:?} already exists")]
    UsernameTaken { username: String },

    /// Password reset for a username that does not exist
    #[error("user {username:?} not found")]
    UserNotFound { username: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Conflict, e.g. creating a client whose ID is already registered
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Generic internal service error, including programmer misuse such as
    /// running a role check before identity resolution
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Storage operation error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } | Error::InvalidCredential | Error::InvalidOrExpiredToken | Error::UnknownClient { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::AdminAlreadyExists | Error::UsernameTaken { .. } | Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::UserNotFound { .. } | Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Store(store_err) => match store_err {
                StoreError::UniqueViolation { .. } => StatusCode::CONFLICT,
                StoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "authentication required".to_string()),
            Error::InvalidCredential
            | Error::InvalidOrExpiredToken
            | Error::UnknownClient { .. }
            | Error::InsufficientPermissions { .. }
            | Error::AdminAlreadyExists
            | Error::UsernameTaken { .. }
            | Error::UserNotFound { .. }
            | Error::BadRequest { .. }
            | Error::NotFound { .. }
            | Error::Conflict { .. } => self.to_string(),
            Error::Internal { .. } | Error::Other(_) => "internal server error".to_string(),
            Error::Store(store_err) => match store_err {
                StoreError::UniqueViolation { .. } => "resource already exists".to_string(),
                StoreError::Other(_) => "internal server error".to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Store(StoreError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Store(_) | Error::Conflict { .. } | Error::AdminAlreadyExists | Error::UsernameTaken { .. } => {
                tracing::warn!("Conflict: {}", self);
            }
            Error::Unauthenticated { .. }
            | Error::InvalidCredential
            | Error::InvalidOrExpiredToken
            | Error::UnknownClient { .. }
            | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::UserNotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "error": self.user_message() });
        (status, axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_errors_map_to_distinct_statuses() {
        assert_eq!(Error::InvalidCredential.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::InvalidOrExpiredToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::AdminAlreadyExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            Error::UsernameTaken {
                username: "alice".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::UserNotFound {
                username: "ghost".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InsufficientPermissions {
                resource: "/api/v1/admin/clients".to_string()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_internal_errors_do_not_leak_detail() {
        let err = Error::Internal {
            operation: "connect to pg at 10.0.0.3".to_string(),
        };
        assert!(!err.user_message().contains("10.0.0.3"));

        let err = Error::Other(anyhow::anyhow!("secret detail"));
        assert_eq!(err.user_message(), "internal server error");
    }
}
