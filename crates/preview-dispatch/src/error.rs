//! Dispatch error types.

use thiserror::Error;

/// Errors raised while dispatching. Elevation errors are recovered by the
/// dispatcher and never reach callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The server refused the elevated `edit` request.
    #[error("edit context rejected for {route}: HTTP {status} ({code})")]
    ElevationRejected {
        route: String,
        status: u16,
        code: String,
    },

    /// Fixtures could not be loaded.
    #[error("invalid fixtures: {0}")]
    Fixtures(String),
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        DispatchError::Fixtures(e.to_string())
    }
}
