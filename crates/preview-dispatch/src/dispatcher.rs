//! Context-elevating dispatcher.
//!
//! While a preview session is active, read requests are first retried under
//! the `edit` context so the preview sees raw field values. When the server
//! refuses the elevated request the original request is dispatched instead;
//! the caller only ever receives one final response.

use std::sync::{Arc, Mutex};

use preview_core::{DispatchContext, RestRequest, RestResponse};
use preview_observability::{DispatchMetrics, ElevationOutcome};
use tracing::{debug, trace};

use crate::error::DispatchError;
use crate::server::RestServer;

/// Dispatcher that upgrades preview reads to the `edit` context.
#[derive(Clone)]
pub struct ElevatingDispatcher {
    server: Arc<dyn RestServer>,
    metrics: Arc<Mutex<DispatchMetrics>>,
}

impl ElevatingDispatcher {
    /// Create a dispatcher in front of a server.
    pub fn new(server: Arc<dyn RestServer>) -> Self {
        Self {
            server,
            metrics: Arc::new(Mutex::new(DispatchMetrics::new())),
        }
    }

    /// Dispatch a request.
    ///
    /// When `preview_active` is set and the request is not already `edit`,
    /// one elevated attempt is made. On success `request.context` is updated
    /// to `edit`; on failure the request is left untouched and dispatched as
    /// is. The response always records the context that produced it.
    pub async fn dispatch(&self, request: &mut RestRequest, preview_active: bool) -> RestResponse {
        let (mut response, outcome) = match self.pre_dispatch(request, preview_active).await {
            Some(Ok(elevated)) => {
                request.context = DispatchContext::Edit;
                (elevated, ElevationOutcome::Elevated)
            }
            Some(Err(err)) => {
                debug!(route = %request.route, error = %err, "falling back to original context");
                (self.server.dispatch(request).await, ElevationOutcome::FellBack)
            }
            None => (
                self.server.dispatch(request).await,
                ElevationOutcome::PassedThrough,
            ),
        };

        self.record(outcome);
        response.export_context(request.context);
        trace!(
            route = %request.route,
            context = %request.context,
            status = response.status.as_u16(),
            "dispatched"
        );
        response
    }

    /// Attempt the elevated dispatch. `None` means the request is not
    /// eligible for elevation.
    async fn pre_dispatch(
        &self,
        request: &RestRequest,
        preview_active: bool,
    ) -> Option<Result<RestResponse, DispatchError>> {
        if request.context.is_edit() || !preview_active {
            return None;
        }

        let edit_request = request.clone().with_context(DispatchContext::Edit);
        let result = self.server.dispatch(&edit_request).await;
        if result.is_error() {
            return Some(Err(DispatchError::ElevationRejected {
                route: request.route.clone(),
                status: result.status.as_u16(),
                code: result.error_code().unwrap_or("unknown").to_string(),
            }));
        }
        Some(Ok(result))
    }

    fn record(&self, outcome: ElevationOutcome) {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(outcome);
    }

    /// Snapshot of the dispatch counters.
    pub fn metrics(&self) -> DispatchMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The underlying server.
    pub fn server(&self) -> &Arc<dyn RestServer> {
        &self.server
    }
}

impl std::fmt::Debug for ElevatingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevatingDispatcher")
            .field("metrics", &self.metrics())
            .finish()
    }
}
