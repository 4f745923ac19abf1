//! Preview nonces.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A nonce bound to the preview action of one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewNonce {
    token: String,
    action: String,
}

impl PreviewNonce {
    /// Action string a nonce is bound to.
    pub fn action_for(theme: &str) -> String {
        format!("preview-customize_{}", theme)
    }

    /// Generate a fresh nonce for a theme.
    pub fn generate(theme: &str) -> Self {
        let bytes: [u8; 18] = rand::thread_rng().gen();
        Self {
            token: URL_SAFE_NO_PAD.encode(bytes),
            action: Self::action_for(theme),
        }
    }

    /// The token value handed to the client.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The action the nonce is bound to.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Check a presented token for a theme.
    pub fn verify(&self, token: &str, theme: &str) -> bool {
        self.token == token && self.action == Self::action_for(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_shape() {
        let nonce = PreviewNonce::generate("twentytwenty");
        // 18 bytes -> 24 url-safe characters
        assert_eq!(nonce.token().len(), 24);
        assert!(nonce
            .token()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(nonce.action(), "preview-customize_twentytwenty");
    }

    #[test]
    fn test_nonce_verify() {
        let nonce = PreviewNonce::generate("twentytwenty");
        let token = nonce.token().to_string();
        assert!(nonce.verify(&token, "twentytwenty"));
        assert!(!nonce.verify(&token, "twentytwentyone"));
        assert!(!nonce.verify("forged", "twentytwenty"));
    }

    #[test]
    fn test_nonces_unique() {
        let a = PreviewNonce::generate("t");
        let b = PreviewNonce::generate("t");
        assert_ne!(a.token(), b.token());
    }
}
