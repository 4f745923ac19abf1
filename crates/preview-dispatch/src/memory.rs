//! Fixture-backed in-memory REST server.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use http::{Method, StatusCode};
use preview_core::{DispatchContext, FieldId, RestRequest, RestResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::DispatchError;
use crate::server::RestServer;

/// Request parameter carrying the preview's dirty values.
pub const CUSTOMIZED_PARAM: &str = "customized";

/// A single REST resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFixture {
    /// Rendered fields, visible in every context.
    pub data: Map<String, Value>,
    /// Raw field values, exposed only in `edit` context.
    #[serde(default)]
    pub raw: Map<String, Value>,
    /// Whether `edit` context is permitted for this resource.
    #[serde(default = "default_true")]
    pub editable: bool,
}

fn default_true() -> bool {
    true
}

impl ResourceFixture {
    /// Create a fixture from a JSON object. Non-object values yield an
    /// empty resource.
    pub fn new(data: Value) -> Self {
        Self {
            data: match data {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            raw: Map::new(),
            editable: true,
        }
    }

    /// Add a raw value for a field.
    pub fn with_raw(mut self, field: impl Into<String>, value: Value) -> Self {
        self.raw.insert(field.into(), value);
        self
    }

    /// Forbid `edit` context.
    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    fn render(&self, context: DispatchContext) -> Map<String, Value> {
        let mut body = self.data.clone();
        if context.is_edit() {
            for (key, raw) in &self.raw {
                let rendered = body.get(key).cloned().unwrap_or(Value::Null);
                body.insert(key.clone(), json!({ "raw": raw, "rendered": rendered }));
            }
        }
        body
    }
}

/// A set of fixtures keyed by route, as stored in a fixtures file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureSet {
    /// Resources keyed by route.
    #[serde(default)]
    pub routes: BTreeMap<String, ResourceFixture>,
}

impl FixtureSet {
    /// Parse fixtures from JSON.
    pub fn from_json(json: &str) -> Result<Self, DispatchError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// In-memory REST server.
///
/// Serves `GET` for each fixture route plus an index at `/` listing the
/// available routes. Dirty values passed in the `customized` parameter are
/// overlaid on the response, keyed by the last segment of each field id.
#[derive(Debug, Default)]
pub struct MemoryRestServer {
    routes: RwLock<BTreeMap<String, ResourceFixture>>,
    log: Mutex<Vec<RestRequest>>,
}

impl MemoryRestServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a server from a fixture set.
    pub fn from_fixtures(fixtures: FixtureSet) -> Self {
        Self {
            routes: RwLock::new(fixtures.routes),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Add or replace a resource.
    pub fn insert(&self, route: impl Into<String>, fixture: ResourceFixture) {
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(route.into(), fixture);
    }

    /// Every request dispatched so far, in order.
    pub fn requests(&self) -> Vec<RestRequest> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Routes served.
    pub fn routes(&self) -> Vec<String> {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    fn index(&self) -> RestResponse {
        let routes: Map<String, Value> = self
            .routes()
            .into_iter()
            .map(|route| (route, json!({ "methods": ["GET"] })))
            .collect();
        RestResponse::ok(json!({ "routes": routes }))
    }

    fn resource(&self, request: &RestRequest) -> RestResponse {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        let Some(fixture) = routes.get(&request.route) else {
            return RestResponse::error(
                StatusCode::NOT_FOUND,
                "rest_no_route",
                "No route was found matching the URL and request method.",
            );
        };

        if request.context.is_edit() && !fixture.editable {
            return RestResponse::error(
                StatusCode::FORBIDDEN,
                "rest_forbidden_context",
                "Sorry, you are not allowed to edit this item.",
            );
        }

        let mut body = fixture.render(request.context);
        if let Some(Value::Object(customized)) = request.param(CUSTOMIZED_PARAM) {
            overlay(&mut body, customized);
        }
        RestResponse::ok(Value::Object(body))
    }
}

/// Apply dirty values to a rendered body.
fn overlay(body: &mut Map<String, Value>, customized: &Map<String, Value>) {
    for (field, value) in customized {
        let Ok(id) = FieldId::parse(field) else {
            continue;
        };
        let Some(key) = id.segments().last() else {
            continue;
        };
        if let Some(Value::Object(shape)) = body.get_mut(key) {
            if shape.contains_key("raw") {
                shape.insert("raw".to_string(), value.clone());
                continue;
            }
        }
        body.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl RestServer for MemoryRestServer {
    async fn dispatch(&self, request: &RestRequest) -> RestResponse {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if request.method != Method::GET {
            return RestResponse::error(
                StatusCode::METHOD_NOT_ALLOWED,
                "rest_no_route",
                "No route was found matching the URL and request method.",
            );
        }
        if request.route == "/" {
            return self.index();
        }
        self.resource(request)
    }
}
