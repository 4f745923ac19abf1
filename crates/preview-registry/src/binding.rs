//! Resource bindings and binding kinds.

use preview_core::FieldId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How edits to a binding reach the preview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Re-request the bound resource; there is no partial postback.
    #[default]
    Refresh,
}

impl Transport {
    /// Get transport as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Refresh => "refresh",
        }
    }
}

/// Kind of a binding, resolved once at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// A `rest_resource[...]` field bound to a REST route.
    RestResource,
    /// Any other configuration field.
    Setting,
}

impl BindingKind {
    /// Resolve the kind for a field.
    pub fn resolve(field: &FieldId) -> Self {
        if field.is_rest_resource() {
            BindingKind::RestResource
        } else {
            BindingKind::Setting
        }
    }

    /// Get kind as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::RestResource => "rest_resource",
            BindingKind::Setting => "setting",
        }
    }

    /// Transport used by bindings of this kind.
    pub fn transport(&self) -> Transport {
        match self {
            BindingKind::RestResource | BindingKind::Setting => Transport::Refresh,
        }
    }

    /// Whether bindings of this kind get a generated control.
    pub fn needs_control(&self) -> bool {
        matches!(self, BindingKind::RestResource)
    }

    /// Whether dirty values of this kind are exported to the preview.
    pub fn exported_to_preview(&self) -> bool {
        matches!(self, BindingKind::RestResource)
    }

    /// Build a binding of this kind.
    pub fn build(self, field: FieldId, route: String) -> ResourceBinding {
        ResourceBinding {
            field,
            route,
            kind: self,
            transport: self.transport(),
            current: None,
            dirty: None,
        }
    }
}

/// A configuration field bound to a REST route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceBinding {
    /// Field identifier.
    pub field: FieldId,
    /// Route of the bound resource.
    pub route: String,
    /// Binding kind.
    pub kind: BindingKind,
    /// Transport mode.
    pub transport: Transport,
    current: Option<Value>,
    dirty: Option<Value>,
}

impl ResourceBinding {
    /// Last known server value.
    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    /// Unsaved local edit.
    pub fn dirty(&self) -> Option<&Value> {
        self.dirty.as_ref()
    }

    /// Check if the dirty value differs from the current value.
    pub fn is_dirty(&self) -> bool {
        match &self.dirty {
            Some(dirty) => self.current.as_ref() != Some(dirty),
            None => false,
        }
    }

    pub(crate) fn set_current(&mut self, value: Value) {
        self.current = Some(value);
    }

    pub(crate) fn set_dirty(&mut self, value: Value) {
        self.dirty = Some(value);
    }

    /// Copy dirty to current. Returns whether anything changed.
    pub(crate) fn commit(&mut self) -> bool {
        match self.dirty.take() {
            Some(value) => {
                self.current = Some(value);
                true
            }
            None => false,
        }
    }

    /// Drop the dirty value. Returns whether there was one.
    pub(crate) fn discard(&mut self) -> bool {
        self.dirty.take().is_some()
    }

    pub(crate) fn reset(&mut self) {
        self.current = None;
        self.dirty = None;
    }
}
