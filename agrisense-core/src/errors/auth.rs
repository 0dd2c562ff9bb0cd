//! Authentication error types
//!
//! Registration and login failures are surfaced to clients as `400` with a
//! short message, matching what the mobile app already displays.

use thiserror::Error;

use super::{CoreError, CoreErrorKind};

/// Authentication and authorisation errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid credentials provided
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Username is already registered
    #[error("Username already exists")]
    UsernameTaken,

    /// Invalid email format
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Invalid username format
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Password does not meet requirements
    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    /// Missing authentication
    #[error("Authentication credentials were not provided")]
    AuthenticationRequired,

    /// Invalid token
    #[error("Invalid token")]
    InvalidToken,

    /// Staff-only operation attempted by a regular user
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Password hashing failed
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

impl AuthError {
    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials
            | AuthError::UsernameTaken
            | AuthError::InvalidEmail(_)
            | AuthError::InvalidUsername(_)
            | AuthError::WeakPassword(_) => 400,
            AuthError::AuthenticationRequired | AuthError::InvalidToken => 401,
            AuthError::PermissionDenied(_) => 403,
            AuthError::Database(_) | AuthError::Hashing(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::UsernameTaken => "USERNAME_TAKEN",
            AuthError::InvalidEmail(_) => "INVALID_EMAIL",
            AuthError::InvalidUsername(_) => "INVALID_USERNAME",
            AuthError::WeakPassword(_) => "WEAK_PASSWORD",
            AuthError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::PermissionDenied(_) => "PERMISSION_DENIED",
            AuthError::Database(_) => "DATABASE_ERROR",
            AuthError::Hashing(_) => "HASHING_ERROR",
        }
    }
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        let kind = match err.http_status_code() {
            400 => CoreErrorKind::Validation,
            401 => CoreErrorKind::Unauthorized,
            403 => CoreErrorKind::Forbidden,
            _ => CoreErrorKind::Internal,
        };
        let code = err.error_code();
        match err {
            AuthError::Database(db) => CoreError::internal("Database error")
                .with_field("code", code)
                .with_source(db),
            AuthError::Hashing(inner) => CoreError::internal("Failed to hash password")
                .with_field("code", code)
                .with_source(inner),
            // Validation messages are shown verbatim by the app.
            AuthError::InvalidEmail(msg)
            | AuthError::InvalidUsername(msg)
            | AuthError::WeakPassword(msg) => CoreError::new(kind, msg).with_field("code", code),
            other => CoreError::new(kind, other.to_string()).with_field("code", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_codes() {
        assert_eq!(AuthError::InvalidCredentials.http_status_code(), 400);
        assert_eq!(AuthError::UsernameTaken.http_status_code(), 400);
        assert_eq!(AuthError::InvalidToken.http_status_code(), 401);
        assert_eq!(
            AuthError::PermissionDenied("generate alerts".into()).http_status_code(),
            403
        );
    }

    #[test]
    fn test_conversion_keeps_client_message() {
        let err: CoreError = AuthError::UsernameTaken.into();
        assert_eq!(err.kind(), CoreErrorKind::Validation);
        assert_eq!(err.message(), "Username already exists");

        let err: CoreError = AuthError::WeakPassword("too short".into()).into();
        assert_eq!(err.message(), "too short");
        assert_eq!(
            err.fields().unwrap().get("code").map(String::as_str),
            Some("WEAK_PASSWORD")
        );
    }
}
