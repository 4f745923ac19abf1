//! Live sync command.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use console::style;
use preview_core::{EventBus, FieldId, PreviewEvent};
use preview_dispatch::ElevatingDispatcher;
use preview_session::SessionHandle;
use preview_sync::{DispatchFetcher, LiveSynchronizer, SyncConfig, SyncState};
use serde_json::json;

use super::SyncArgs;
use crate::context::Context;

/// Run the sync command.
pub async fn run(args: SyncArgs, ctx: &Context) -> Result<()> {
    let server = ctx.server()?;
    let registry = Arc::new(Mutex::new(ctx.registry()?));
    let session = SessionHandle::new(ctx.session());
    let fetcher = DispatchFetcher::new(ElevatingDispatcher::new(server), session.clone());

    let config = match args.debounce_ms {
        Some(ms) => SyncConfig::with_debounce(Duration::from_millis(ms)),
        None => ctx.config.sync_config(),
    };

    let bus = EventBus::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    bus.subscribe(move |event: &PreviewEvent| {
        sink.lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    });

    let handle = LiveSynchronizer::spawn(registry.clone(), Arc::new(fetcher), session, bus, config);

    for assignment in args.edits {
        let field = FieldId::parse(&assignment.field)
            .with_context(|| format!("Invalid field: {}", assignment.field))?;
        handle
            .edit(&field, assignment.value)
            .await
            .with_context(|| format!("Cannot edit {}", field))?;
    }

    let spinner = ctx.output.spinner("Waiting for preview to refresh...");
    let state = handle.wait_until_settled().await?;
    spinner.finish_and_clear();

    let committed = if args.commit {
        handle.commit_all()
    } else {
        Vec::new()
    };
    let metrics = handle.metrics();
    handle.shutdown().await;

    let events = events.lock().unwrap_or_else(|e| e.into_inner()).clone();
    for event in &events {
        ctx.output.event(event);
    }
    let refreshed: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            PreviewEvent::ResourceRefreshed {
                route,
                context,
                body,
            } => Some(json!({ "route": route, "context": context, "body": body })),
            _ => None,
        })
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "state": state,
            "refreshed": refreshed,
            "committed": committed.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "metrics": metrics,
        }));
        return Ok(());
    }

    ctx.output.header("Preview sync");
    ctx.output.kv("state", &state_badge(&state));
    for (route, counters) in &metrics.routes {
        ctx.output.kv(
            route,
            &format!(
                "{} edit(s), {} request(s), {} refreshed, {} stale, {} failed",
                counters.edits, counters.requests, counters.refreshed, counters.stale, counters.failures
            ),
        );
    }
    for event in &refreshed {
        ctx.output.info("");
        ctx.output.info(&format!(
            "{} ({})",
            event["route"].as_str().unwrap_or_default(),
            event["context"].as_str().unwrap_or_default()
        ));
        println!("{}", serde_json::to_string_pretty(&event["body"])?);
    }
    for field in &committed {
        ctx.output.success(&format!("Committed {}", field));
    }

    Ok(())
}

/// Colored badge for a synchronizer state.
fn state_badge(state: &SyncState) -> String {
    match state {
        SyncState::Idle => style(state.as_str()).green().to_string(),
        SyncState::Dirty | SyncState::Syncing => style(state.as_str()).yellow().to_string(),
        SyncState::Failed { .. } => style(state.to_string()).red().to_string(),
        SyncState::Halted => style(state.as_str()).dim().to_string(),
    }
}
