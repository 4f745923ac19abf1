//! Registry of field-to-route bindings.

use std::collections::{BTreeMap, HashMap, HashSet};

use preview_core::{BindingConfig, FieldId};
use serde_json::Value;
use tracing::{debug, trace};

use crate::binding::{BindingKind, ResourceBinding};
use crate::error::RegistryError;
use crate::layout::ControlLayout;

/// Tracks which fields are bound to which REST routes and which of them
/// hold unsaved values.
///
/// Each field id maps to exactly one binding; registering a field again
/// replaces its route (last registration wins). Iteration follows
/// registration order.
#[derive(Debug, Default)]
pub struct BindingRegistry {
    /// Bindings keyed by field.
    bindings: HashMap<FieldId, ResourceBinding>,
    /// Order fields were first registered.
    order: Vec<FieldId>,
}

impl BindingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from binding configurations.
    pub fn from_configs<'a>(
        configs: impl IntoIterator<Item = &'a BindingConfig>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for config in configs {
            let field = FieldId::parse(&config.field)?;
            registry.register(config.route.clone(), field);
        }
        Ok(registry)
    }

    /// Create or update the binding for a field.
    ///
    /// Re-registering under the same route keeps the binding's values.
    /// Re-registering under a different route resets them, since they
    /// belonged to another resource. Either way the field keeps its
    /// original position.
    pub fn register(&mut self, route: impl Into<String>, field: FieldId) -> &ResourceBinding {
        let route = route.into();
        let kind = BindingKind::resolve(&field);

        match self.bindings.get_mut(&field) {
            Some(existing) => {
                if existing.route != route {
                    debug!(field = %field, from = %existing.route, to = %route, "rebinding field");
                    existing.route = route;
                    existing.reset();
                }
            }
            None => {
                trace!(field = %field, route = %route, kind = kind.as_str(), "registering field");
                self.order.push(field.clone());
                self.bindings
                    .insert(field.clone(), kind.build(field.clone(), route));
            }
        }

        &self.bindings[&field]
    }

    /// Parse a field id and register it.
    pub fn register_str(
        &mut self,
        route: impl Into<String>,
        field: &str,
    ) -> Result<&ResourceBinding, RegistryError> {
        let field = FieldId::parse(field)?;
        Ok(self.register(route, field))
    }

    /// Get a binding by field.
    pub fn get(&self, field: &FieldId) -> Option<&ResourceBinding> {
        self.bindings.get(field)
    }

    /// Get a binding, failing if the field is not registered.
    pub fn require(&self, field: &FieldId) -> Result<&ResourceBinding, RegistryError> {
        self.bindings
            .get(field)
            .ok_or_else(|| RegistryError::UnknownBinding(field.clone()))
    }

    fn require_mut(&mut self, field: &FieldId) -> Result<&mut ResourceBinding, RegistryError> {
        self.bindings
            .get_mut(field)
            .ok_or_else(|| RegistryError::UnknownBinding(field.clone()))
    }

    /// Check if a field is registered.
    pub fn contains(&self, field: &FieldId) -> bool {
        self.bindings.contains_key(field)
    }

    /// Record the last known server value of a field.
    pub fn set_current(&mut self, field: &FieldId, value: Value) -> Result<(), RegistryError> {
        self.require_mut(field)?.set_current(value);
        Ok(())
    }

    /// Record an unsaved edit. Returns the route the field is bound to.
    pub fn set_dirty(&mut self, field: &FieldId, value: Value) -> Result<String, RegistryError> {
        let binding = self.require_mut(field)?;
        binding.set_dirty(value);
        Ok(binding.route.clone())
    }

    /// Dirty values of every binding whose edit differs from its current
    /// value.
    pub fn dirty_values(&self) -> BTreeMap<FieldId, Value> {
        self.iter()
            .filter(|b| b.is_dirty())
            .filter_map(|b| Some((b.field.clone(), b.dirty()?.clone())))
            .collect()
    }

    /// Dirty values of the bindings on one route.
    pub fn dirty_values_for_route(&self, route: &str) -> BTreeMap<FieldId, Value> {
        self.iter()
            .filter(|b| b.route == route && b.is_dirty())
            .filter_map(|b| Some((b.field.clone(), b.dirty()?.clone())))
            .collect()
    }

    /// Routes with at least one dirty binding, in registration order.
    pub fn dirty_routes(&self) -> Vec<String> {
        self.routes_for(self.iter().filter(|b| b.is_dirty()).map(|b| &b.field))
    }

    /// Unique routes of the given fields, in registration order. Unknown
    /// fields are ignored.
    pub fn routes_for<'a>(&self, fields: impl IntoIterator<Item = &'a FieldId>) -> Vec<String> {
        let wanted: HashSet<&FieldId> = fields.into_iter().collect();
        let mut seen = HashSet::new();
        self.iter()
            .filter(|b| wanted.contains(&b.field))
            .filter(|b| seen.insert(b.route.as_str()))
            .map(|b| b.route.clone())
            .collect()
    }

    /// Copy a field's dirty value to its current value. Calling it again is
    /// a no-op.
    pub fn commit(&mut self, field: &FieldId) -> Result<(), RegistryError> {
        if self.require_mut(field)?.commit() {
            debug!(field = %field, "committed");
        }
        Ok(())
    }

    /// Drop a field's dirty value without committing it.
    pub fn discard(&mut self, field: &FieldId) -> Result<(), RegistryError> {
        if self.require_mut(field)?.discard() {
            debug!(field = %field, "discarded");
        }
        Ok(())
    }

    /// Commit every dirty value (publish). Returns the committed fields.
    pub fn commit_all(&mut self) -> Vec<FieldId> {
        let mut committed = Vec::new();
        for field in &self.order {
            if let Some(binding) = self.bindings.get_mut(field) {
                if binding.commit() {
                    committed.push(field.clone());
                }
            }
        }
        committed
    }

    /// Discard every dirty value (session end). Returns the discarded fields.
    pub fn discard_all(&mut self) -> Vec<FieldId> {
        let mut discarded = Vec::new();
        for field in &self.order {
            if let Some(binding) = self.bindings.get_mut(field) {
                if binding.discard() {
                    discarded.push(field.clone());
                }
            }
        }
        discarded
    }

    /// Remove bindings whose field is no longer rendered. Returns the
    /// removed fields in registration order.
    pub fn prune<'a>(&mut self, live: impl IntoIterator<Item = &'a FieldId>) -> Vec<FieldId> {
        let live: HashSet<&FieldId> = live.into_iter().collect();
        let (kept, removed): (Vec<FieldId>, Vec<FieldId>) =
            self.order.drain(..).partition(|f| live.contains(f));
        for field in &removed {
            self.bindings.remove(field);
        }
        self.order = kept;
        if !removed.is_empty() {
            debug!(count = removed.len(), "pruned stale bindings");
        }
        removed
    }

    /// Generate controls for REST resource bindings that lack one.
    pub fn layout_controls(&self, existing: &HashSet<FieldId>) -> ControlLayout {
        ControlLayout::build(self.iter(), existing)
    }

    /// Iterate bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceBinding> {
        self.order.iter().filter_map(|f| self.bindings.get(f))
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn field(raw: &str) -> FieldId {
        FieldId::parse(raw).unwrap()
    }

    #[test]
    fn test_page_title_scenario() {
        let mut registry = BindingRegistry::new();
        let title = field("rest_resource[pages][4][title]");
        registry.register("/wp/v2/pages/4", title.clone());

        let route = registry.set_dirty(&title, json!("New Title")).unwrap();
        assert_eq!(route, "/wp/v2/pages/4");

        let dirty = registry.dirty_values();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[&title], json!("New Title"));

        registry.commit(&title).unwrap();
        assert!(registry.dirty_values().is_empty());
        assert_eq!(registry.get(&title).unwrap().current(), Some(&json!("New Title")));
    }

    #[test]
    fn test_commit_is_idempotent() {
        let mut registry = BindingRegistry::new();
        let title = field("rest_resource[pages][4][title]");
        registry.register("/wp/v2/pages/4", title.clone());
        registry.set_dirty(&title, json!("A")).unwrap();

        registry.commit(&title).unwrap();
        let once = registry.get(&title).unwrap().current().cloned();
        registry.commit(&title).unwrap();
        let twice = registry.get(&title).unwrap().current().cloned();

        assert_eq!(once, twice);
        assert_eq!(twice, Some(json!("A")));
    }

    #[test]
    fn test_discard_keeps_current() {
        let mut registry = BindingRegistry::new();
        let title = field("rest_resource[pages][4][title]");
        registry.register("/wp/v2/pages/4", title.clone());
        registry.set_current(&title, json!("Old")).unwrap();
        registry.set_dirty(&title, json!("New")).unwrap();

        registry.discard(&title).unwrap();
        let binding = registry.get(&title).unwrap();
        assert_eq!(binding.current(), Some(&json!("Old")));
        assert!(binding.dirty().is_none());
    }

    #[test]
    fn test_unknown_binding() {
        let mut registry = BindingRegistry::new();
        let missing = field("rest_resource[posts][9][title]");

        assert_eq!(
            registry.commit(&missing),
            Err(RegistryError::UnknownBinding(missing.clone()))
        );
        assert!(registry.discard(&missing).is_err());
        assert!(registry.set_dirty(&missing, json!(1)).is_err());
        assert!(registry.require(&missing).is_err());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = BindingRegistry::new();
        let title = field("rest_resource[pages][4][title]");
        let other = field("rest_resource[pages][5][title]");

        registry.register("/wp/v2/pages/4", title.clone());
        registry.register("/wp/v2/pages/5", other.clone());
        registry.set_dirty(&title, json!("x")).unwrap();

        // same route keeps values
        registry.register("/wp/v2/pages/4", title.clone());
        assert!(registry.get(&title).unwrap().is_dirty());

        for route in ["/wp/v2/pages/40", "/wp/v2/pages/41", "/wp/v2/pages/42"] {
            registry.register(route, title.clone());
        }

        assert_eq!(registry.len(), 2);
        let binding = registry.get(&title).unwrap();
        assert_eq!(binding.route, "/wp/v2/pages/42");
        assert!(binding.dirty().is_none());

        let order: Vec<_> = registry.iter().map(|b| b.field.clone()).collect();
        assert_eq!(order, [title, other]);
    }

    #[test]
    fn test_routes_for_dedupes_in_order() {
        let mut registry = BindingRegistry::new();
        let title = field("rest_resource[pages][4][title]");
        let content = field("rest_resource[pages][4][content]");
        let post = field("rest_resource[posts][1][title]");
        registry.register("/wp/v2/posts/1", post.clone());
        registry.register("/wp/v2/pages/4", title.clone());
        registry.register("/wp/v2/pages/4", content.clone());

        let routes = registry.routes_for([&content, &title, &post]);
        assert_eq!(routes, ["/wp/v2/posts/1", "/wp/v2/pages/4"]);

        registry.set_dirty(&content, json!("c")).unwrap();
        assert_eq!(registry.dirty_routes(), ["/wp/v2/pages/4"]);
        assert_eq!(registry.dirty_values_for_route("/wp/v2/pages/4").len(), 1);
        assert!(registry.dirty_values_for_route("/wp/v2/posts/1").is_empty());
    }

    #[test]
    fn test_prune_removes_stale_bindings() {
        let mut registry = BindingRegistry::new();
        let title = field("rest_resource[pages][4][title]");
        let gone = field("rest_resource[pages][5][title]");
        registry.register("/wp/v2/pages/4", title.clone());
        registry.register("/wp/v2/pages/5", gone.clone());
        registry.set_dirty(&gone, json!("stale")).unwrap();

        let removed = registry.prune([&title]);
        assert_eq!(removed, [gone.clone()]);
        assert!(!registry.contains(&gone));
        assert!(registry.dirty_values().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_commit_all_and_discard_all() {
        let mut registry = BindingRegistry::from_configs(&[
            BindingConfig::new("/wp/v2/pages/4", "rest_resource[pages][4][title]"),
            BindingConfig::new("/wp/v2/pages/5", "rest_resource[pages][5][title]"),
        ])
        .unwrap();
        let a = field("rest_resource[pages][4][title]");
        let b = field("rest_resource[pages][5][title]");

        registry.set_dirty(&a, json!("A")).unwrap();
        assert_eq!(registry.commit_all(), [a.clone()]);

        registry.set_dirty(&a, json!("A2")).unwrap();
        registry.set_dirty(&b, json!("B2")).unwrap();
        assert_eq!(registry.discard_all(), [a.clone(), b]);
        assert_eq!(registry.get(&a).unwrap().current(), Some(&json!("A")));
    }

    #[test]
    fn test_from_configs_rejects_bad_field() {
        let result = BindingRegistry::from_configs(&[BindingConfig::new("/x", "bad[")]);
        assert!(matches!(result, Err(RegistryError::InvalidField(_))));
    }
}
