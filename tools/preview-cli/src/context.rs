//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use preview_dispatch::{FixtureSet, MemoryRestServer};
use preview_registry::BindingRegistry;
use preview_session::PreviewSession;

use crate::config::PreviewConfig;
use crate::output::Output;

/// Config file names searched for, in order.
pub const CONFIG_NAMES: [&str; 3] = ["preview.toml", ".preview.toml", "preview.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: PreviewConfig,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
    /// File the config was loaded from, if any.
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = if let Some(path) = config_path {
            (PreviewConfig::load(path)?, Some(PathBuf::from(path)))
        } else {
            // Try to find config in current directory or parent directories
            match Self::find_config(&cwd) {
                Some((config, path)) => (config, Some(path)),
                None => (PreviewConfig::default(), None),
            }
        };

        Ok(Self {
            config,
            output,
            cwd,
            config_path,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(PreviewConfig, PathBuf)> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = PreviewConfig::load(config_path.to_str()?) {
                        return Some((config, config_path));
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Resolve a path relative to the config file, or the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            return path;
        }
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(path),
            _ => self.cwd.join(path),
        }
    }

    /// Load the fixture set named by `[fixtures]`. Empty when unset.
    pub fn fixtures(&self) -> Result<FixtureSet> {
        let Some(path) = &self.config.fixtures.path else {
            return Ok(FixtureSet::default());
        };
        let path = self.resolve_path(path);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read fixtures: {}", path.display()))?;
        FixtureSet::from_json(&content)
            .with_context(|| format!("Failed to parse fixtures: {}", path.display()))
    }

    /// In-memory REST server backed by the configured fixtures.
    pub fn server(&self) -> Result<Arc<MemoryRestServer>> {
        Ok(Arc::new(MemoryRestServer::from_fixtures(self.fixtures()?)))
    }

    /// Registry holding the configured bindings.
    pub fn registry(&self) -> Result<BindingRegistry> {
        BindingRegistry::from_configs(&self.config.bindings).context("Invalid binding in config")
    }

    /// Start a preview session for the configured theme.
    pub fn session(&self) -> PreviewSession {
        PreviewSession::start(&self.config.preview.theme).with_duration(chrono::Duration::seconds(
            self.config.preview.session_duration_secs,
        ))
    }
}
