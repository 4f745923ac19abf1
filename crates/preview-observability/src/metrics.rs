//! Dispatch and synchronizer metrics.

use std::collections::BTreeMap;

use serde::Serialize;

/// Outcome of a single pass through the elevating dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationOutcome {
    /// Request was already `edit` or no preview session was active.
    PassedThrough,
    /// Elevated dispatch succeeded.
    Elevated,
    /// Elevated dispatch failed; the original request was dispatched.
    FellBack,
}

/// Counters for the elevating dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchMetrics {
    /// Requests dispatched unmodified.
    pub passed_through: u64,
    /// Requests answered under `edit` context.
    pub elevated: u64,
    /// Elevation attempts that fell back to the original request.
    pub fell_back: u64,
}

impl DispatchMetrics {
    /// Create empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome.
    pub fn record(&mut self, outcome: ElevationOutcome) {
        match outcome {
            ElevationOutcome::PassedThrough => self.passed_through += 1,
            ElevationOutcome::Elevated => self.elevated += 1,
            ElevationOutcome::FellBack => self.fell_back += 1,
        }
    }

    /// Total requests dispatched to callers.
    pub fn total(&self) -> u64 {
        self.passed_through + self.elevated + self.fell_back
    }

    /// Number of server round trips, counting the extra elevated attempt.
    pub fn round_trips(&self) -> u64 {
        self.passed_through + self.elevated + 2 * self.fell_back
    }
}

/// Counters for a single route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteSyncMetrics {
    /// Field edits that touched this route.
    pub edits: u64,
    /// Requests issued.
    pub requests: u64,
    /// Responses applied to the preview.
    pub refreshed: u64,
    /// Responses dropped because a newer request had started.
    pub stale: u64,
    /// Failed requests.
    pub failures: u64,
}

impl RouteSyncMetrics {
    /// Edits folded into an already-pending request.
    pub fn coalesced(&self) -> u64 {
        self.edits.saturating_sub(self.requests)
    }
}

/// Per-route counters for the live preview synchronizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncMetrics {
    /// Counters keyed by route.
    pub routes: BTreeMap<String, RouteSyncMetrics>,
    /// Times the session expired during sync.
    pub session_expirations: u64,
}

impl SyncMetrics {
    /// Create empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    fn route_mut(&mut self, route: &str) -> &mut RouteSyncMetrics {
        self.routes.entry(route.to_string()).or_default()
    }

    /// Record a field edit.
    pub fn record_edit(&mut self, route: &str) {
        self.route_mut(route).edits += 1;
    }

    /// Record an issued request.
    pub fn record_request(&mut self, route: &str) {
        self.route_mut(route).requests += 1;
    }

    /// Record an applied response.
    pub fn record_refresh(&mut self, route: &str) {
        self.route_mut(route).refreshed += 1;
    }

    /// Record a discarded stale response.
    pub fn record_stale(&mut self, route: &str) {
        self.route_mut(route).stale += 1;
    }

    /// Record a failed request.
    pub fn record_failure(&mut self, route: &str) {
        self.route_mut(route).failures += 1;
    }

    /// Record a session expiry.
    pub fn record_session_expired(&mut self) {
        self.session_expirations += 1;
    }

    /// Counters for a route, if any were recorded.
    pub fn route(&self, route: &str) -> Option<&RouteSyncMetrics> {
        self.routes.get(route)
    }

    /// Total requests across all routes.
    pub fn total_requests(&self) -> u64 {
        self.routes.values().map(|r| r.requests).sum()
    }
}
