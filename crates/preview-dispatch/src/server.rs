//! The host REST dispatch boundary.

use std::sync::Arc;

use async_trait::async_trait;
use preview_core::{RestRequest, RestResponse};

/// A REST server that can dispatch requests in-process.
///
/// Failures are reported through the response status, never as `Err`:
/// a response is an error when [`RestResponse::is_error`] is true.
#[async_trait]
pub trait RestServer: Send + Sync {
    /// Dispatch a request and return the response.
    async fn dispatch(&self, request: &RestRequest) -> RestResponse;
}

#[async_trait]
impl<T: RestServer + ?Sized> RestServer for Arc<T> {
    async fn dispatch(&self, request: &RestRequest) -> RestResponse {
        (**self).dispatch(request).await
    }
}
