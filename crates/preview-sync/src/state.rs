//! Synchronizer state.

use serde::Serialize;

/// Visible state of a synchronizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    /// Nothing pending.
    #[default]
    Idle,
    /// Edits are waiting for the debounce window to close.
    Dirty,
    /// At least one request is in flight.
    Syncing,
    /// The last request for a route failed. The next edit clears this.
    Failed { route: String, message: String },
    /// The session expired; nothing is sent until re-authentication.
    Halted,
}

impl SyncState {
    /// Get state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Dirty => "dirty",
            SyncState::Syncing => "syncing",
            SyncState::Failed { .. } => "failed",
            SyncState::Halted => "halted",
        }
    }

    /// Check if no work is pending or running.
    pub fn is_settled(&self) -> bool {
        !matches!(self, SyncState::Dirty | SyncState::Syncing)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Failed { route, message } => write!(f, "failed ({}: {})", route, message),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
