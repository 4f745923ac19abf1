//! Resource fetchers.

use std::sync::Arc;

use async_trait::async_trait;
use preview_core::{RestRequest, RestResponse};
use preview_dispatch::ElevatingDispatcher;
use preview_session::SessionHandle;
use tracing::debug;

use crate::error::FetchError;

/// Re-requests a bound resource.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch a resource. Error responses are returned as [`FetchError`].
    async fn fetch(&self, request: RestRequest) -> Result<RestResponse, FetchError>;
}

#[async_trait]
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for Arc<T> {
    async fn fetch(&self, request: RestRequest) -> Result<RestResponse, FetchError> {
        (**self).fetch(request).await
    }
}

/// Fetcher that goes through the elevating dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchFetcher {
    dispatcher: ElevatingDispatcher,
    session: SessionHandle,
}

impl DispatchFetcher {
    /// Create a fetcher for a session.
    pub fn new(dispatcher: ElevatingDispatcher, session: SessionHandle) -> Self {
        Self {
            dispatcher,
            session,
        }
    }

    /// The dispatcher used for requests.
    pub fn dispatcher(&self) -> &ElevatingDispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl ResourceFetcher for DispatchFetcher {
    async fn fetch(&self, mut request: RestRequest) -> Result<RestResponse, FetchError> {
        self.session.validate()?;

        let response = self
            .dispatcher
            .dispatch(&mut request, self.session.is_active())
            .await;
        if response.is_error() {
            let message = response
                .error_message()
                .map(str::to_string)
                .unwrap_or_else(|| response.status.to_string());
            debug!(route = %request.route, status = response.status.as_u16(), "fetch failed");
            return Err(FetchError::Http {
                status: response.status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}
