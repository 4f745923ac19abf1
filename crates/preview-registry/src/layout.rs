//! Generated controls for REST resource bindings.

use std::collections::HashSet;

use preview_core::FieldId;
use serde::Serialize;

use crate::binding::ResourceBinding;

/// Section holding every generated REST resource control.
pub const REST_RESOURCES_SECTION: &str = "rest_resources";

/// A section of the configuration pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Section identifier.
    pub id: String,
    /// Display title.
    pub title: String,
}

/// A control rendering one bound field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    /// Control identifier (same as the field id).
    pub id: FieldId,
    /// Section the control lives in.
    pub section: String,
    /// Field the control edits.
    pub setting: FieldId,
    /// Position within the section.
    pub priority: u32,
}

/// Section plus the controls generated for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlLayout {
    /// The REST resources section.
    pub section: Section,
    /// Generated controls, ordered by priority.
    pub controls: Vec<Control>,
}

impl ControlLayout {
    /// Build controls for every binding that needs one and has none yet.
    /// Priorities count up from zero in the order bindings are given.
    pub fn build<'a>(
        bindings: impl IntoIterator<Item = &'a ResourceBinding>,
        existing: &HashSet<FieldId>,
    ) -> Self {
        let controls = bindings
            .into_iter()
            .filter(|b| b.kind.needs_control() && !existing.contains(&b.field))
            .zip(0u32..)
            .map(|(binding, priority)| Control {
                id: binding.field.clone(),
                section: REST_RESOURCES_SECTION.to_string(),
                setting: binding.field.clone(),
                priority,
            })
            .collect();

        Self {
            section: Section {
                id: REST_RESOURCES_SECTION.to_string(),
                title: "REST Resources".to_string(),
            },
            controls,
        }
    }

    /// Check if no control was generated.
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}
