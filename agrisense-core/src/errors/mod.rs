//! Error types for agrisense-core
//!
//! - **CoreError**: the error every service returns; carries a kind that the
//!   HTTP layer maps onto a status code
//! - **AuthError**: registration, login and token failures
//! - **UpstreamError**: failures reaching external APIs and model servers
//!
//! Both domain enums convert into `CoreError` so services can use `?`.

pub mod auth;
pub mod core_error;
pub mod upstream;

pub use auth::AuthError;
pub use core_error::{CoreError, CoreErrorKind};
pub use upstream::UpstreamError;

/// Result type alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type alias for outbound HTTP calls
pub type UpstreamResult<T> = Result<T, UpstreamError>;
