//! Session errors.

use thiserror::Error;

/// Session error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session token expired; the user must re-authenticate.
    #[error("preview session expired")]
    Expired,

    /// The session was ended explicitly.
    #[error("preview session ended")]
    Ended,

    /// The presented nonce does not match the session.
    #[error("invalid preview nonce")]
    InvalidNonce,

    /// The REST API root is not an absolute http(s) URL.
    #[error("invalid REST API root: {0}")]
    InvalidApiRoot(String),

    /// The REST index could not be fetched for the pane bootstrap.
    #[error("could not load REST schema: {0}")]
    Schema(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SessionError {
    /// Check if the user has to re-authenticate.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, SessionError::Expired | SessionError::Ended | SessionError::InvalidNonce)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}
