//! Binding configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a single field-to-route binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// REST route backing the field (e.g., "/wp/v2/pages/4").
    pub route: String,
    /// Field identifier (e.g., "rest_resource[pages][4][title]").
    pub field: String,
}

impl BindingConfig {
    /// Create a new binding configuration.
    pub fn new(route: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            field: field.into(),
        }
    }
}
