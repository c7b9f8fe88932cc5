//! Error types for challenge-response authentication

use thiserror::Error;

/// Authentication errors
///
/// Messages deliberately carry no nonce, hash or secret material; the
/// specific reason for a rejection is logged by the server at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Fatal: the role cannot be constructed or started
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid challenge: server nonce is empty")]
    InvalidChallenge,

    #[error("Malformed request: {0} is empty")]
    MalformedRequest(&'static str),

    #[error("Unknown or expired nonce")]
    UnknownOrExpiredNonce,

    #[error("Hash mismatch")]
    HashMismatch,
}

/// Coarse classification of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal, raised at construction; do not serve traffic
    Configuration,
    /// Per-request, the request was malformed; no state was touched
    Validation,
    /// Per-request, the proof of secret knowledge was rejected
    Authentication,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Configuration(_) => ErrorKind::Configuration,
            AuthError::InvalidChallenge | AuthError::MalformedRequest(_) => ErrorKind::Validation,
            AuthError::UnknownOrExpiredNonce | AuthError::HashMismatch => {
                ErrorKind::Authentication
            }
        }
    }

    /// True for errors that must stop the caller from serving traffic
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Result type for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AuthError::Configuration("secret is required".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(AuthError::InvalidChallenge.kind(), ErrorKind::Validation);
        assert_eq!(
            AuthError::MalformedRequest("hash").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AuthError::UnknownOrExpiredNonce.kind(),
            ErrorKind::Authentication
        );
        assert_eq!(AuthError::HashMismatch.kind(), ErrorKind::Authentication);

        assert!(AuthError::Configuration(String::new()).is_fatal());
        assert!(!AuthError::HashMismatch.is_fatal());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AuthError::MalformedRequest("clientNonce").to_string(),
            "Malformed request: clientNonce is empty"
        );
    }
}
