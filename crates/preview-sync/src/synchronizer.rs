//! Debounced live preview synchronizer.
//!
//! One actor task owns the scheduling state. Edits restart a shared debounce
//! timer; when it fires, every pending route is re-requested once with the
//! dirty values bound to it. A route never has more than one request in
//! flight: routes edited while their request runs stay queued and are sent
//! when it completes. Each route carries a generation number, bumped when a
//! newer edit or an invalidation supersedes the running request, and
//! responses from older generations are discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use preview_core::{DispatchContext, EventBus, FieldId, PreviewEvent, RestRequest, RestResponse};
use preview_dispatch::CUSTOMIZED_PARAM;
use preview_observability::SyncMetrics;
use preview_registry::BindingRegistry;
use preview_session::{PreviewSession, SessionError, SessionHandle};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::{FetchError, SyncError};
use crate::fetcher::ResourceFetcher;
use crate::state::SyncState;

/// Synchronizer configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last edit before requests are sent.
    pub debounce: Duration,
}

impl SyncConfig {
    /// Default debounce window in milliseconds.
    pub const DEFAULT_DEBOUNCE_MS: u64 = 250;

    /// Create a config with a debounce window.
    pub fn with_debounce(debounce: Duration) -> Self {
        Self { debounce }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(Self::DEFAULT_DEBOUNCE_MS),
        }
    }
}

enum Command {
    Touched {
        route: String,
        ack: oneshot::Sender<()>,
    },
    Invalidate {
        routes: Vec<String>,
        ack: oneshot::Sender<()>,
    },
    Resume {
        ack: oneshot::Sender<()>,
    },
    SessionEnded {
        ack: oneshot::Sender<()>,
    },
    Shutdown,
}

struct Completion {
    route: String,
    generation: u64,
    result: Result<RestResponse, FetchError>,
}

/// Entry point for starting synchronizers.
pub struct LiveSynchronizer;

impl LiveSynchronizer {
    /// Spawn a synchronizer on the current tokio runtime.
    pub fn spawn(
        registry: Arc<Mutex<BindingRegistry>>,
        fetcher: Arc<dyn ResourceFetcher>,
        session: SessionHandle,
        bus: EventBus,
        config: SyncConfig,
    ) -> SyncHandle {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SyncState::Idle);
        let metrics = Arc::new(Mutex::new(SyncMetrics::new()));

        let actor = Actor {
            registry: registry.clone(),
            fetcher,
            session: session.clone(),
            bus: bus.clone(),
            debounce: config.debounce,
            metrics: metrics.clone(),
            state_tx,
            completion_tx,
            pending: Vec::new(),
            deadline: None,
            in_flight: HashMap::new(),
            generations: HashMap::new(),
            failed: None,
            halted: false,
        };
        let task = tokio::spawn(actor.run(command_rx, completion_rx));

        SyncHandle {
            registry,
            session,
            bus,
            commands: command_tx,
            state: state_rx,
            metrics,
            task,
        }
    }
}

/// Handle to a running synchronizer.
pub struct SyncHandle {
    registry: Arc<Mutex<BindingRegistry>>,
    session: SessionHandle,
    bus: EventBus,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SyncState>,
    metrics: Arc<Mutex<SyncMetrics>>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Record an edit and schedule a refresh of the bound route.
    ///
    /// Fails with an unknown-binding error when the field was never
    /// registered.
    pub async fn edit(&self, field: &FieldId, value: Value) -> Result<(), SyncError> {
        let route = self.lock_registry().set_dirty(field, value)?;
        trace!(field = %field, route = %route, "field edited");

        self.bus.emit(PreviewEvent::FieldEdited {
            field: field.clone(),
            route: route.clone(),
        });
        self.request(|ack| Command::Touched { route, ack }).await
    }

    /// Publish every dirty value.
    pub fn commit_all(&self) -> Vec<FieldId> {
        let committed = self.lock_registry().commit_all();
        for field in &committed {
            self.bus.emit(PreviewEvent::FieldCommitted {
                field: field.clone(),
            });
        }
        info!(count = committed.len(), "committed preview changes");
        committed
    }

    /// Drop every dirty value and cancel refreshes for the affected routes.
    pub async fn discard_all(&self) -> Result<Vec<FieldId>, SyncError> {
        let (discarded, routes) = {
            let mut registry = self.lock_registry();
            let discarded = registry.discard_all();
            let routes = registry.routes_for(&discarded);
            (discarded, routes)
        };
        for field in &discarded {
            self.bus.emit(PreviewEvent::FieldDiscarded {
                field: field.clone(),
            });
        }
        self.request(|ack| Command::Invalidate { routes, ack }).await?;
        Ok(discarded)
    }

    /// Install a fresh session and resume a halted synchronizer.
    pub async fn reauthenticate(&self, session: PreviewSession) -> Result<(), SyncError> {
        session.validate()?;
        self.session.replace(session);
        self.bus.emit(PreviewEvent::SessionResumed);
        self.request(|ack| Command::Resume { ack }).await
    }

    /// End the preview session. Dirty values are discarded, running
    /// requests are invalidated and the synchronizer halts until
    /// `reauthenticate`.
    pub async fn end_session(&self) -> Result<(), SyncError> {
        self.session.end();
        self.request(|ack| Command::SessionEnded { ack }).await
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Wait until nothing is pending or in flight.
    pub async fn wait_until_settled(&self) -> Result<SyncState, SyncError> {
        let mut state = self.state.clone();
        let settled = state
            .wait_for(SyncState::is_settled)
            .await
            .map_err(|_| SyncError::Closed)?;
        Ok(settled.clone())
    }

    /// Snapshot of the sync counters.
    pub fn metrics(&self) -> SyncMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The shared session.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Stop the actor and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(err) = self.task.await {
            warn!(error = %err, "synchronizer task panicked");
        }
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, BindingRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<()>) -> Command,
    ) -> Result<(), SyncError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(command(ack))
            .await
            .map_err(|_| SyncError::Closed)?;
        done.await.map_err(|_| SyncError::Closed)
    }
}

struct Actor {
    registry: Arc<Mutex<BindingRegistry>>,
    fetcher: Arc<dyn ResourceFetcher>,
    session: SessionHandle,
    bus: EventBus,
    debounce: Duration,
    metrics: Arc<Mutex<SyncMetrics>>,
    state_tx: watch::Sender<SyncState>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    /// Routes waiting to be requested, in the order they were first touched.
    pending: Vec<String>,
    deadline: Option<Instant>,
    /// Generation of the request running for each route.
    in_flight: HashMap<String, u64>,
    generations: HashMap<String, u64>,
    failed: Option<(String, String)>,
    halted: bool,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            let deadline = self.deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = completions.recv() => self.handle_completion(completion),
                _ = tokio::time::sleep_until(deadline), if self.deadline.is_some() && !self.halted => {
                    self.deadline = None;
                    self.flush();
                    self.publish();
                }
            }
        }
        debug!("synchronizer stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Touched { route, ack } => {
                self.touch(route);
                self.publish();
                let _ = ack.send(());
            }
            Command::Invalidate { routes, ack } => {
                for route in routes {
                    self.pending.retain(|r| *r != route);
                    if self.in_flight.contains_key(&route) {
                        self.bump(&route);
                    }
                }
                if self.pending.is_empty() {
                    self.deadline = None;
                }
                self.failed = None;
                self.publish();
                let _ = ack.send(());
            }
            Command::Resume { ack } => {
                self.resume();
                self.publish();
                let _ = ack.send(());
            }
            Command::SessionEnded { ack } => {
                self.drop_session_edits();
                self.halt();
                self.publish();
                let _ = ack.send(());
            }
            Command::Shutdown => {}
        }
    }

    fn touch(&mut self, route: String) {
        self.lock_metrics().record_edit(&route);
        if self.in_flight.contains_key(&route) {
            // the running request predates this edit
            self.bump(&route);
        }
        if !self.pending.contains(&route) {
            self.pending.push(route);
        }
        self.failed = None;
        self.deadline = Some(Instant::now() + self.debounce);
    }

    fn resume(&mut self) {
        if !self.halted {
            return;
        }
        info!("resuming synchronization");
        self.halted = false;
        let running: Vec<String> = self.in_flight.keys().cloned().collect();
        for route in running {
            self.bump(&route);
            if !self.pending.contains(&route) {
                self.pending.push(route);
            }
        }
        if !self.pending.is_empty() {
            self.deadline = Some(Instant::now());
        }
    }

    /// Send every pending route that has no request running.
    fn flush(&mut self) {
        match self.session.validate() {
            Ok(()) => {}
            Err(SessionError::Ended) => {
                debug!("session ended, dropping its edits");
                self.drop_session_edits();
                self.halt();
                return;
            }
            Err(err) => {
                debug!(error = %err, "session invalid, not sending");
                self.halt();
                return;
            }
        }

        let (ready, waiting): (Vec<String>, Vec<String>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|route| !self.in_flight.contains_key(route));
        self.pending = waiting;
        for route in ready {
            self.issue(route);
        }
    }

    fn issue(&mut self, route: String) {
        let generation = self.bump(&route);
        self.in_flight.insert(route.clone(), generation);

        let customized: Map<String, Value> = self
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .dirty_values_for_route(&route)
            .into_iter()
            .map(|(field, value)| (field.to_string(), value))
            .collect();
        let request = RestRequest::get(route.clone()).with_param(CUSTOMIZED_PARAM, Value::Object(customized));

        self.lock_metrics().record_request(&route);
        self.bus.emit(PreviewEvent::SyncStarted {
            route: route.clone(),
        });
        debug!(route = %route, generation, "requesting resource");

        let fetcher = self.fetcher.clone();
        let completions = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(request).await;
            let _ = completions.send(Completion {
                route,
                generation,
                result,
            });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        let Completion {
            route,
            generation,
            result,
        } = completion;
        self.in_flight.remove(&route);

        if self.generations.get(&route) != Some(&generation) {
            trace!(route = %route, generation, "discarding stale response");
            self.lock_metrics().record_stale(&route);
            self.bus.emit(PreviewEvent::StaleResponseDiscarded {
                route: route.clone(),
            });
        } else {
            match result {
                Ok(response) => {
                    self.lock_metrics().record_refresh(&route);
                    self.bus.emit(PreviewEvent::ResourceRefreshed {
                        route,
                        context: response.context.unwrap_or(DispatchContext::Read),
                        body: response.body,
                    });
                }
                Err(FetchError::SessionEnded) => {
                    self.drop_session_edits();
                    self.halt();
                }
                Err(err) if err.halts_sync() => {
                    if !self.pending.contains(&route) {
                        self.pending.insert(0, route);
                    }
                    self.halt();
                }
                Err(err) => {
                    warn!(route = %route, error = %err, "sync request failed");
                    self.lock_metrics().record_failure(&route);
                    let message = err.to_string();
                    self.bus.emit(PreviewEvent::SyncFailed {
                        route: route.clone(),
                        message: message.clone(),
                    });
                    self.failed = Some((route, message));
                }
            }
        }

        // routes deferred behind this request go out once the timer is done
        if self.deadline.is_none() && !self.halted && !self.pending.is_empty() {
            self.flush();
        }
        self.publish();
    }

    /// Discard every dirty value and cancel all queued and running work.
    fn drop_session_edits(&mut self) {
        let discarded = self
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .discard_all();
        for field in discarded {
            self.bus.emit(PreviewEvent::FieldDiscarded { field });
        }

        let running: Vec<String> = self.in_flight.keys().cloned().collect();
        for route in running {
            self.bump(&route);
        }
        self.pending.clear();
        self.deadline = None;
        self.failed = None;
    }

    fn halt(&mut self) {
        if self.halted {
            return;
        }
        warn!("preview session no longer valid, halting synchronization");
        self.halted = true;
        self.lock_metrics().record_session_expired();
        self.bus.emit(PreviewEvent::SessionExpired);
    }

    fn bump(&mut self, route: &str) -> u64 {
        let generation = self.generations.entry(route.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn state(&self) -> SyncState {
        if self.halted {
            SyncState::Halted
        } else if !self.in_flight.is_empty() {
            SyncState::Syncing
        } else if !self.pending.is_empty() {
            SyncState::Dirty
        } else if let Some((route, message)) = &self.failed {
            SyncState::Failed {
                route: route.clone(),
                message: message.clone(),
            }
        } else {
            SyncState::Idle
        }
    }

    fn publish(&self) {
        let state = self.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                trace!(state = %state, "sync state changed");
                *current = state;
                true
            }
        });
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, SyncMetrics> {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }
}
