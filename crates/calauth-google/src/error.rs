//! Error types for credential operations.
//!
//! Every failure in this crate is fatal to the caller: nothing here retries,
//! so the error carries a category for reporting only.

use std::fmt;
use thiserror::Error;

/// The category of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    /// The provider rejected the grant, the user denied consent, or the
    /// callback was inconsistent (state mismatch).
    AuthenticationFailed,
    /// Connection failed, timed out or could not be read.
    NetworkError,
    /// The token endpoint returned something we could not parse.
    InvalidResponse,
    /// Client secret file or loopback listener could not be set up.
    ConfigurationError,
    /// The token file could not be read, parsed or written.
    StorageError,
    /// Unexpected state.
    InternalError,
}

impl AuthErrorCode {
    /// Returns a stable snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::NetworkError => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::ConfigurationError => "configuration_error",
            Self::StorageError => "storage_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while loading, obtaining, refreshing or storing a credential.
#[derive(Debug, Error)]
pub struct AuthError {
    code: AuthErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    /// Creates a new error with the given code and message.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::AuthenticationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::NetworkError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::ConfigurationError, message)
    }

    /// Creates a token storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::StorageError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::InternalError, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> AuthErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_names() {
        assert_eq!(
            AuthErrorCode::AuthenticationFailed.as_str(),
            "authentication_failed"
        );
        assert_eq!(AuthErrorCode::StorageError.as_str(), "storage_error");
    }

    #[test]
    fn auth_error_creation() {
        let err = AuthError::storage("failed to parse token file");
        assert_eq!(err.code(), AuthErrorCode::StorageError);
        assert_eq!(err.message(), "failed to parse token file");
    }

    #[test]
    fn auth_error_display() {
        let err = AuthError::network("connection refused");
        assert_eq!(err.to_string(), "network_error: connection refused");
    }

    #[test]
    fn auth_error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = AuthError::storage("failed to write token file").with_source(io_err);
        assert!(err.source().is_some());
    }
}
