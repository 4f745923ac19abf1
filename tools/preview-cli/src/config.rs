//! CLI configuration.

use anyhow::{Context, Result};
use preview_core::BindingConfig;
use preview_session::PreviewSession;
use preview_sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Preview session settings.
    #[serde(default)]
    pub preview: PreviewSection,

    /// Synchronizer settings.
    #[serde(default)]
    pub sync: SyncSection,

    /// Fixture source for the in-memory REST server.
    #[serde(default)]
    pub fixtures: FixturesSection,

    /// Field-to-route bindings, registered in file order.
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

impl PreviewConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Synchronizer config derived from the `[sync]` section.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::with_debounce(std::time::Duration::from_millis(self.sync.debounce_ms))
    }
}

/// `[preview]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSection {
    /// Theme being previewed.
    #[serde(default = "default_theme")]
    pub theme: String,

    /// Absolute URL of the REST API root.
    #[serde(default = "default_rest_api_root")]
    pub rest_api_root: String,

    /// Lifetime of a preview session.
    #[serde(default = "default_session_duration")]
    pub session_duration_secs: i64,
}

fn default_theme() -> String {
    "twentytwenty".to_string()
}

fn default_rest_api_root() -> String {
    "http://localhost/wp-json/".to_string()
}

fn default_session_duration() -> i64 {
    PreviewSession::DEFAULT_DURATION_SECS
}

impl Default for PreviewSection {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            rest_api_root: default_rest_api_root(),
            session_duration_secs: default_session_duration(),
        }
    }
}

/// `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Debounce window in milliseconds.
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

fn default_debounce() -> u64 {
    SyncConfig::DEFAULT_DEBOUNCE_MS
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
        }
    }
}

/// `[fixtures]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixturesSection {
    /// JSON fixture file, relative to the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Generate a default preview.toml config file.
pub fn generate_default_config(theme: &str) -> String {
    format!(
        r#"# REST resource preview configuration

[preview]
theme = "{theme}"
rest_api_root = "http://localhost/wp-json/"
session_duration_secs = 3600

[sync]
debounce_ms = 250

[fixtures]
# path = "fixtures.json"

[[bindings]]
route = "/wp/v2/pages/4"
field = "rest_resource[pages][4][title]"
"#,
        theme = theme
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: PreviewConfig = toml::from_str(&generate_default_config("twentytwenty")).unwrap();
        assert_eq!(config.preview.theme, "twentytwenty");
        assert_eq!(config.preview.session_duration_secs, 3600);
        assert_eq!(config.sync.debounce_ms, 250);
        assert!(config.fixtures.path.is_none());
        assert_eq!(
            config.bindings,
            [BindingConfig::new("/wp/v2/pages/4", "rest_resource[pages][4][title]")]
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: PreviewConfig = toml::from_str("").unwrap();
        assert_eq!(config.preview.rest_api_root, "http://localhost/wp-json/");
        assert_eq!(config.sync_config().debounce.as_millis(), 250);
        assert!(config.bindings.is_empty());
    }
}
