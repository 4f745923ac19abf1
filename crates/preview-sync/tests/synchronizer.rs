use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use preview_core::{DispatchContext, EventBus, FieldId, PreviewEvent, RestRequest, RestResponse};
use preview_dispatch::{ElevatingDispatcher, MemoryRestServer, ResourceFixture, CUSTOMIZED_PARAM};
use preview_registry::{BindingRegistry, RegistryError};
use preview_session::{PreviewSession, SessionHandle};
use preview_sync::{
    DispatchFetcher, FetchError, LiveSynchronizer, ResourceFetcher, SyncConfig, SyncError,
    SyncHandle, SyncState,
};
use serde_json::{json, Value};

const PAGE: &str = "/wp/v2/pages/4";
const POST: &str = "/wp/v2/posts/1";

/// Fetcher with a fixed latency that records every request.
#[derive(Default)]
struct ScriptedFetcher {
    delay: Duration,
    calls: Mutex<Vec<RestRequest>>,
    running: Mutex<HashMap<String, usize>>,
    max_overlap: AtomicUsize,
    failures: Mutex<VecDeque<FetchError>>,
}

impl ScriptedFetcher {
    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    fn fail_next(&self, err: FetchError) {
        self.failures.lock().unwrap().push_back(err);
    }

    fn calls(&self) -> Vec<RestRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedFetcher {
    async fn fetch(&self, request: RestRequest) -> Result<RestResponse, FetchError> {
        self.calls.lock().unwrap().push(request.clone());
        {
            let mut running = self.running.lock().unwrap();
            let count = running.entry(request.route.clone()).or_insert(0);
            *count += 1;
            self.max_overlap.fetch_max(*count, Ordering::SeqCst);
        }

        tokio::time::sleep(self.delay).await;

        *self
            .running
            .lock()
            .unwrap()
            .get_mut(&request.route)
            .unwrap() -= 1;

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(RestResponse::ok(json!({
            "route": request.route,
            "customized": request.param(CUSTOMIZED_PARAM).cloned().unwrap_or(Value::Null),
        })))
    }
}

fn field(id: &str) -> FieldId {
    FieldId::parse(id).unwrap()
}

fn title() -> FieldId {
    field("rest_resource[pages][4][title]")
}

fn registry() -> Arc<Mutex<BindingRegistry>> {
    let mut registry = BindingRegistry::new();
    registry.register(PAGE, title());
    registry.register(PAGE, field("rest_resource[pages][4][content]"));
    registry.register(POST, field("rest_resource[posts][1][title]"));
    Arc::new(Mutex::new(registry))
}

fn recorder(bus: &EventBus) -> Arc<Mutex<Vec<PreviewEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    bus.subscribe(move |event: &PreviewEvent| sink.lock().unwrap().push(event.clone()));
    events
}

struct Harness {
    handle: SyncHandle,
    fetcher: Arc<ScriptedFetcher>,
    registry: Arc<Mutex<BindingRegistry>>,
    events: Arc<Mutex<Vec<PreviewEvent>>>,
}

fn spawn_with(fetcher: Arc<ScriptedFetcher>, session: PreviewSession) -> Harness {
    let registry = registry();
    let bus = EventBus::new();
    let events = recorder(&bus);
    let handle = LiveSynchronizer::spawn(
        registry.clone(),
        fetcher.clone(),
        SessionHandle::new(session),
        bus,
        SyncConfig::default(),
    );
    Harness {
        handle,
        fetcher,
        registry,
        events,
    }
}

fn spawn(delay: Duration) -> Harness {
    spawn_with(
        ScriptedFetcher::with_delay(delay),
        PreviewSession::start("twentytwenty"),
    )
}

fn count(events: &Mutex<Vec<PreviewEvent>>, pred: impl Fn(&PreviewEvent) -> bool) -> usize {
    events.lock().unwrap().iter().filter(|e| pred(e)).count()
}

#[tokio::test(start_paused = true)]
async fn test_edits_in_window_coalesce_into_one_request() {
    let h = spawn(Duration::from_millis(10));

    for i in 0..5 {
        h.handle.edit(&title(), json!(format!("Title {i}"))).await.unwrap();
        assert_eq!(h.handle.state(), SyncState::Dirty);
        tokio::time::advance(Duration::from_millis(100)).await;
    }
    assert!(h.fetcher.calls().is_empty());

    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Idle);

    let calls = h.fetcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].route, PAGE);
    assert_eq!(calls[0].context, DispatchContext::Read);
    assert_eq!(
        calls[0].param(CUSTOMIZED_PARAM),
        Some(&json!({ "rest_resource[pages][4][title]": "Title 4" }))
    );

    let metrics = h.handle.metrics();
    let page = metrics.route(PAGE).unwrap();
    assert_eq!(page.requests, 1);
    assert_eq!(page.coalesced(), 4);
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_each_route_requested_once_in_edit_order() {
    let h = spawn(Duration::from_millis(10));

    h.handle
        .edit(&field("rest_resource[posts][1][title]"), json!("Post"))
        .await
        .unwrap();
    h.handle.edit(&title(), json!("Page")).await.unwrap();
    h.handle
        .edit(&field("rest_resource[pages][4][content]"), json!("Body"))
        .await
        .unwrap();
    h.handle.wait_until_settled().await.unwrap();

    let routes: Vec<String> = h.fetcher.calls().into_iter().map(|r| r.route).collect();
    assert_eq!(routes, [POST, PAGE]);
    assert_eq!(h.fetcher.calls()[1].param(CUSTOMIZED_PARAM).unwrap().as_object().unwrap().len(), 2);
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::ResourceRefreshed { .. })),
        2
    );
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_overlapping_requests_per_route() {
    let h = spawn(Duration::from_secs(1));

    h.handle.edit(&title(), json!("First")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.handle.state(), SyncState::Syncing);

    // debounce closes while the first request is still running
    h.handle.edit(&title(), json!("Second")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.fetcher.calls().len(), 1);
    assert_eq!(h.handle.state(), SyncState::Syncing);

    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Idle);
    assert_eq!(h.fetcher.calls().len(), 2);
    assert_eq!(h.fetcher.max_overlap.load(Ordering::SeqCst), 1);

    let events = h.events.lock().unwrap().clone();
    let refreshed: Vec<&Value> = events
        .iter()
        .filter_map(|e| match e {
            PreviewEvent::ResourceRefreshed { body, .. } => Some(body),
            _ => None,
        })
        .collect();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(
        refreshed[0]["customized"]["rest_resource[pages][4][title]"],
        "Second"
    );
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::StaleResponseDiscarded { .. })),
        1
    );
    assert_eq!(h.handle.metrics().route(PAGE).unwrap().stale, 1);
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_visible_and_next_edit_recovers() {
    let h = spawn(Duration::from_millis(10));
    h.fetcher.fail_next(FetchError::Network("connection reset".to_string()));

    h.handle.edit(&title(), json!("A")).await.unwrap();
    let state = h.handle.wait_until_settled().await.unwrap();
    assert_eq!(
        state,
        SyncState::Failed {
            route: PAGE.to_string(),
            message: "network error: connection reset".to_string(),
        }
    );
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::SyncFailed { .. })),
        1
    );

    h.handle.edit(&title(), json!("B")).await.unwrap();
    assert_eq!(h.handle.state(), SyncState::Dirty);
    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Idle);
    assert_eq!(h.fetcher.calls().len(), 2);
    assert_eq!(h.handle.metrics().route(PAGE).unwrap().failures, 1);
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_session_expiry_halts_until_reauthentication() {
    let expired = PreviewSession::start("twentytwenty").with_duration(chrono::Duration::seconds(-1));
    let h = spawn_with(ScriptedFetcher::with_delay(Duration::from_millis(10)), expired);

    h.handle.edit(&title(), json!("A")).await.unwrap();
    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Halted);
    assert!(h.fetcher.calls().is_empty());
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::SessionExpired)),
        1
    );

    // edits while halted are kept but not sent
    h.handle.edit(&title(), json!("B")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.handle.state(), SyncState::Halted);
    assert!(h.fetcher.calls().is_empty());

    h.handle
        .reauthenticate(PreviewSession::start("twentytwenty"))
        .await
        .unwrap();
    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Idle);

    let calls = h.fetcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].param(CUSTOMIZED_PARAM),
        Some(&json!({ "rest_resource[pages][4][title]": "B" }))
    );
    assert_eq!(h.handle.metrics().session_expirations, 1);
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::SessionResumed)),
        1
    );
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reauthenticate_rejects_dead_session() {
    let h = spawn(Duration::from_millis(10));
    let mut ended = PreviewSession::start("twentytwenty");
    ended.end();

    let err = h.handle.reauthenticate(ended).await.unwrap_err();
    assert!(matches!(err, SyncError::Session(_)));
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_discard_all_cancels_pending_and_in_flight() {
    let h = spawn(Duration::from_secs(1));

    h.handle.edit(&title(), json!("A")).await.unwrap();
    let discarded = h.handle.discard_all().await.unwrap();
    assert_eq!(discarded, [title()]);
    assert_eq!(h.handle.state(), SyncState::Idle);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.fetcher.calls().is_empty());

    h.handle.edit(&title(), json!("B")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.handle.state(), SyncState::Syncing);
    h.handle.discard_all().await.unwrap();

    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Idle);
    assert_eq!(h.fetcher.calls().len(), 1);
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::ResourceRefreshed { .. })),
        0
    );
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::FieldDiscarded { .. })),
        2
    );
    assert!(h.registry.lock().unwrap().dirty_values().is_empty());
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_field_edit_fails() {
    let h = spawn(Duration::from_millis(10));
    let unknown = field("rest_resource[pages][9][title]");

    let err = h.handle.edit(&unknown, json!("x")).await.unwrap_err();
    assert_eq!(err, SyncError::Registry(RegistryError::UnknownBinding(unknown)));
    assert_eq!(h.handle.state(), SyncState::Idle);
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_page_title_preview_and_commit() {
    let server = Arc::new(MemoryRestServer::new());
    server.insert(
        PAGE,
        ResourceFixture::new(json!({ "id": 4, "title": "Hello" })).with_raw("title", json!("Hello")),
    );
    let session = SessionHandle::new(PreviewSession::start("twentytwenty"));
    let fetcher = DispatchFetcher::new(ElevatingDispatcher::new(server.clone()), session.clone());

    let registry = registry();
    let bus = EventBus::new();
    let events = recorder(&bus);
    let handle = LiveSynchronizer::spawn(
        registry.clone(),
        Arc::new(fetcher),
        session,
        bus,
        SyncConfig::with_debounce(Duration::from_millis(100)),
    );

    registry
        .lock()
        .unwrap()
        .set_current(&title(), json!("Hello"))
        .unwrap();
    handle.edit(&title(), json!("New Title")).await.unwrap();
    assert_eq!(handle.wait_until_settled().await.unwrap(), SyncState::Idle);

    let refreshed = events
        .lock()
        .unwrap()
        .iter()
        .find_map(|e| match e {
            PreviewEvent::ResourceRefreshed { context, body, .. } => Some((*context, body.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(refreshed.0, DispatchContext::Edit);
    assert_eq!(refreshed.1["title"]["raw"], "New Title");

    // the preview read went out once, already elevated
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].context, DispatchContext::Edit);

    assert_eq!(handle.commit_all(), [title()]);
    {
        let registry = registry.lock().unwrap();
        let binding = registry.get(&title()).unwrap();
        assert_eq!(binding.current(), Some(&json!("New Title")));
        assert!(!binding.is_dirty());
    }
    assert_eq!(handle.commit_all(), Vec::<FieldId>::new());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_fetcher_reports_http_errors() {
    let server = Arc::new(MemoryRestServer::new());
    let session = SessionHandle::new(PreviewSession::start("twentytwenty"));
    let fetcher = DispatchFetcher::new(ElevatingDispatcher::new(server), session.clone());

    let err = fetcher.fetch(RestRequest::get(PAGE)).await.unwrap_err();
    assert!(matches!(err, FetchError::Http { status: 404, .. }));

    session.replace(PreviewSession::start("twentytwenty").with_duration(chrono::Duration::seconds(-1)));
    let err = fetcher.fetch(RestRequest::get(PAGE)).await.unwrap_err();
    assert_eq!(err, FetchError::SessionExpired);

    session.end();
    let err = fetcher.fetch(RestRequest::get(PAGE)).await.unwrap_err();
    assert_eq!(err, FetchError::SessionEnded);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_during_request_requeues_route() {
    let h = spawn(Duration::from_millis(10));
    h.fetcher.fail_next(FetchError::SessionExpired);

    h.handle.edit(&title(), json!("A")).await.unwrap();
    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Halted);
    assert_eq!(h.fetcher.calls().len(), 1);
    assert_eq!(h.handle.metrics().session_expirations, 1);

    h.handle
        .reauthenticate(PreviewSession::start("twentytwenty"))
        .await
        .unwrap();
    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Idle);

    let calls = h.fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].param(CUSTOMIZED_PARAM),
        Some(&json!({ "rest_resource[pages][4][title]": "A" }))
    );
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::ResourceRefreshed { .. })),
        1
    );
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ended_session_discards_its_edits() {
    let h = spawn(Duration::from_millis(10));

    h.handle.edit(&title(), json!("from ended session")).await.unwrap();
    h.handle.session().end();
    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Halted);
    assert!(h.registry.lock().unwrap().dirty_values().is_empty());
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::FieldDiscarded { .. })),
        1
    );

    h.handle
        .reauthenticate(PreviewSession::start("twentytwenty"))
        .await
        .unwrap();
    assert_eq!(h.handle.wait_until_settled().await.unwrap(), SyncState::Idle);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.fetcher.calls().is_empty());
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_end_session_invalidates_running_request() {
    let h = spawn(Duration::from_secs(1));

    h.handle.edit(&title(), json!("A")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.handle.state(), SyncState::Syncing);

    h.handle.end_session().await.unwrap();
    assert_eq!(h.handle.state(), SyncState::Halted);
    assert!(!h.handle.session().is_active());
    assert!(h.registry.lock().unwrap().dirty_values().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.fetcher.calls().len(), 1);
    assert_eq!(h.handle.metrics().route(PAGE).unwrap().stale, 1);
    assert_eq!(
        count(&h.events, |e| matches!(e, PreviewEvent::ResourceRefreshed { .. })),
        0
    );
    h.handle.shutdown().await;
}
