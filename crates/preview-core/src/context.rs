//! Dispatch context and REST request/response value types.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response header carrying the context that produced an `edit` response.
pub const CONTEXT_HEADER: &str = "x-rest-resources-context";

/// REST permission scope of a request.
///
/// `Edit` exposes raw, unsanitized fields and usually requires elevated
/// permissions on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchContext {
    #[default]
    Read,
    Edit,
}

impl DispatchContext {
    /// Wire name of the context.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Edit => "edit",
        }
    }

    /// Check if this is the elevated context.
    pub fn is_edit(&self) -> bool {
        matches!(self, Self::Edit)
    }
}

impl fmt::Display for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a context name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dispatch context: {0}")]
pub struct UnknownContext(pub String);

impl FromStr for DispatchContext {
    type Err = UnknownContext;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // "view" is the conventional REST name for the read scope
            "read" | "view" => Ok(Self::Read),
            "edit" => Ok(Self::Edit),
            other => Err(UnknownContext(other.to_string())),
        }
    }
}

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let seq = NEXT.fetch_add(1, Ordering::Relaxed);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self(format!("{:x}-{:x}", nanos, seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inbound REST request as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    /// Unique request identifier.
    pub id: RequestId,
    /// HTTP method.
    pub method: Method,
    /// Route relative to the API root (e.g., "/wp/v2/pages/4").
    pub route: String,
    /// Effective context of the request.
    pub context: DispatchContext,
    /// Request parameters.
    pub params: Map<String, Value>,
}

impl RestRequest {
    /// Create a new request in `read` context.
    pub fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            id: RequestId::generate(),
            method,
            route: route.into(),
            context: DispatchContext::Read,
            params: Map::new(),
        }
    }

    /// Create a GET request.
    pub fn get(route: impl Into<String>) -> Self {
        Self::new(Method::GET, route)
    }

    /// Set the request context.
    pub fn with_context(mut self, context: DispatchContext) -> Self {
        self.context = context;
        self
    }

    /// Add a request parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Get a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

/// The result of dispatching a [`RestRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// JSON body.
    pub body: Value,
    /// Context that produced this response, once known.
    pub context: Option<DispatchContext>,
}

impl RestResponse {
    /// Create a response with the given status and body.
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
            context: None,
        }
    }

    /// Create a 200 response.
    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Create an error response with a REST-style error body.
    pub fn error(status: StatusCode, code: &str, message: &str) -> Self {
        Self::new(
            status,
            serde_json::json!({
                "code": code,
                "message": message,
                "data": { "status": status.as_u16() },
            }),
        )
    }

    /// Check if the response represents an error (4xx or 5xx).
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    /// Error code from a REST-style error body.
    pub fn error_code(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        self.body.get("code").and_then(Value::as_str)
    }

    /// Error message from a REST-style error body.
    pub fn error_message(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        self.body.get("message").and_then(Value::as_str)
    }

    /// Get a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Record the effective context and export it as a header when elevated.
    pub fn export_context(&mut self, context: DispatchContext) {
        self.context = Some(context);
        if context.is_edit() {
            self.headers.insert(
                HeaderName::from_static(CONTEXT_HEADER),
                HeaderValue::from_static(context.as_str()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_parsing() {
        assert_eq!("edit".parse::<DispatchContext>(), Ok(DispatchContext::Edit));
        assert_eq!("view".parse::<DispatchContext>(), Ok(DispatchContext::Read));
        assert_eq!("READ".parse::<DispatchContext>(), Ok(DispatchContext::Read));
        assert!("embed".parse::<DispatchContext>().is_err());
    }

    #[test]
    fn test_error_response() {
        let resp = RestResponse::error(StatusCode::FORBIDDEN, "rest_forbidden_context", "nope");
        assert!(resp.is_error());
        assert_eq!(resp.error_code(), Some("rest_forbidden_context"));
        assert_eq!(resp.error_message(), Some("nope"));
        assert_eq!(resp.body["data"]["status"], 403);
    }

    #[test]
    fn test_export_context_header() {
        let mut read = RestResponse::ok(Value::Null);
        read.export_context(DispatchContext::Read);
        assert_eq!(read.context, Some(DispatchContext::Read));
        assert!(read.header(CONTEXT_HEADER).is_none());

        let mut edit = RestResponse::ok(Value::Null);
        edit.export_context(DispatchContext::Edit);
        assert_eq!(edit.header(CONTEXT_HEADER), Some("edit"));
    }

    #[test]
    fn test_request_ids_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }
}
