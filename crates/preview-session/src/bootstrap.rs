//! Bootstrap blobs handed to the client process.

use std::collections::BTreeMap;

use preview_core::RestRequest;
use preview_dispatch::RestServer;
use preview_registry::BindingRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::SessionError;
use crate::session::PreviewSession;

/// Check that the API root is an absolute http(s) URL and make it end with `/`.
pub fn normalize_api_root(root: &str) -> Result<String, SessionError> {
    let root = root.trim();
    let rest = root
        .strip_prefix("https://")
        .or_else(|| root.strip_prefix("http://"))
        .ok_or_else(|| SessionError::InvalidApiRoot(root.to_string()))?;

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(SessionError::InvalidApiRoot(root.to_string()));
    }

    if root.ends_with('/') {
        Ok(root.to_string())
    } else {
        Ok(format!("{}/", root))
    }
}

/// Blob handed to the preview frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewBootstrap {
    pub previewed_theme: String,
    pub preview_nonce: String,
    pub rest_api_root: String,
    /// Dirty values of REST resource fields only, keyed by field id.
    pub initial_dirty_setting_values: BTreeMap<String, Value>,
}

impl PreviewBootstrap {
    /// Collect the blob from a live session and the registry.
    pub fn collect(
        session: &PreviewSession,
        registry: &BindingRegistry,
        rest_api_root: &str,
    ) -> Result<Self, SessionError> {
        session.validate()?;
        let rest_api_root = normalize_api_root(rest_api_root)?;

        let initial_dirty_setting_values: BTreeMap<String, Value> = registry
            .iter()
            .filter(|binding| binding.kind.exported_to_preview())
            .filter_map(|binding| {
                binding
                    .dirty()
                    .map(|value| (binding.field.to_string(), value.clone()))
            })
            .collect();

        debug!(
            theme = %session.theme,
            dirty = initial_dirty_setting_values.len(),
            "collected preview bootstrap"
        );

        Ok(Self {
            previewed_theme: session.theme.clone(),
            preview_nonce: session.nonce().token().to_string(),
            rest_api_root,
            initial_dirty_setting_values,
        })
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Blob handed to the configuration pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneBootstrap {
    pub previewed_theme: String,
    pub preview_nonce: String,
    pub rest_api_root: String,
    /// Body of the REST index (`GET /`).
    pub schema: Value,
}

impl PaneBootstrap {
    /// Collect the blob, fetching the REST index from the server.
    pub async fn collect(
        session: &PreviewSession,
        server: &dyn RestServer,
        rest_api_root: &str,
    ) -> Result<Self, SessionError> {
        session.validate()?;
        let rest_api_root = normalize_api_root(rest_api_root)?;

        let response = server.dispatch(&RestRequest::get("/")).await;
        if response.is_error() {
            let message = response
                .error_message()
                .map(str::to_string)
                .unwrap_or_else(|| response.status.to_string());
            return Err(SessionError::Schema(message));
        }

        Ok(Self {
            previewed_theme: session.theme.clone(),
            preview_nonce: session.nonce().token().to_string(),
            rest_api_root,
            schema: response.body,
        })
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }
}
