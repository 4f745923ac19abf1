//! Synchronizer errors.

use preview_registry::RegistryError;
use preview_session::SessionError;
use thiserror::Error;

/// Errors surfaced by the synchronizer handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The synchronizer task is gone.
    #[error("synchronizer stopped")]
    Closed,
}

/// Errors from fetching a resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with an error status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The preview session expired.
    #[error("preview session expired")]
    SessionExpired,

    /// The preview session was ended.
    #[error("preview session ended")]
    SessionEnded,
}

impl FetchError {
    /// Check if the error halts synchronization.
    pub fn halts_sync(&self) -> bool {
        matches!(self, FetchError::SessionExpired | FetchError::SessionEnded)
    }
}

impl From<SessionError> for FetchError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Ended => FetchError::SessionEnded,
            _ => FetchError::SessionExpired,
        }
    }
}
