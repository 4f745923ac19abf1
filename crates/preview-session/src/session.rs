//! Preview session management.

use std::sync::{Arc, RwLock};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SessionError;
use crate::nonce::PreviewNonce;

/// Session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new random session ID.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        Self(format!("prv_{}", URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A preview session for one theme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSession {
    /// Session ID.
    pub id: SessionId,
    /// Theme being previewed.
    pub theme: String,
    nonce: PreviewNonce,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time of the nonce.
    pub expires_at: DateTime<Utc>,
    ended: bool,
}

impl PreviewSession {
    /// Default session duration: 24 hours.
    pub const DEFAULT_DURATION_SECS: i64 = 24 * 60 * 60;

    /// Start a session for a theme.
    pub fn start(theme: impl Into<String>) -> Self {
        let theme = theme.into();
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            nonce: PreviewNonce::generate(&theme),
            theme,
            created_at: now,
            expires_at: now + Duration::seconds(Self::DEFAULT_DURATION_SECS),
            ended: false,
        }
    }

    /// Set a custom duration, counted from creation.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.expires_at = self.created_at + duration;
        self
    }

    /// The session nonce.
    pub fn nonce(&self) -> &PreviewNonce {
        &self.nonce
    }

    /// Check if the nonce expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the session was ended.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Check if the session can still drive a preview.
    pub fn is_active(&self) -> bool {
        !self.ended && !self.is_expired()
    }

    /// Validate the session, returning an error if it cannot be used.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.ended {
            Err(SessionError::Ended)
        } else if self.is_expired() {
            Err(SessionError::Expired)
        } else {
            Ok(())
        }
    }

    /// Verify a presented nonce.
    pub fn verify_nonce(&self, token: &str) -> Result<(), SessionError> {
        self.validate()?;
        if self.nonce.verify(token, &self.theme) {
            Ok(())
        } else {
            Err(SessionError::InvalidNonce)
        }
    }

    /// Issue a fresh nonce and extend the expiry.
    pub fn renew(&mut self, duration: Duration) {
        self.nonce = PreviewNonce::generate(&self.theme);
        self.expires_at = Utc::now() + duration;
        self.ended = false;
        debug!(session = %self.id, expires_at = %self.expires_at, "preview session renewed");
    }

    /// End the session.
    pub fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            info!(session = %self.id, theme = %self.theme, "preview session ended");
        }
    }

    /// Seconds until expiry, zero once expired.
    pub fn time_to_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// A session shared between the synchronizer and its fetcher.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<PreviewSession>>,
}

impl SessionHandle {
    /// Wrap a session.
    pub fn new(session: PreviewSession) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> PreviewSession {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Validate the current session.
    pub fn validate(&self) -> Result<(), SessionError> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).validate()
    }

    /// Check if the current session is active.
    pub fn is_active(&self) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).is_active()
    }

    /// Swap in a new session after re-authentication.
    pub fn replace(&self, session: PreviewSession) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = session;
    }

    /// End the current session.
    pub fn end(&self) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).end();
    }
}

impl From<PreviewSession> for SessionHandle {
    fn from(session: PreviewSession) -> Self {
        Self::new(session)
    }
}
