//! Single-route dispatch command.

use anyhow::{bail, Result};
use console::style;
use http::StatusCode;
use preview_core::{DispatchContext, RestRequest, CONTEXT_HEADER};
use preview_dispatch::ElevatingDispatcher;
use serde_json::json;

use super::DispatchArgs;
use crate::context::Context;

/// Run the dispatch command.
pub async fn run(args: DispatchArgs, ctx: &Context) -> Result<()> {
    let dispatcher = ElevatingDispatcher::new(ctx.server()?);

    let context = if args.edit {
        DispatchContext::Edit
    } else {
        DispatchContext::Read
    };
    let mut request = RestRequest::get(&args.route).with_context(context);
    let response = dispatcher.dispatch(&mut request, !args.no_preview).await;
    let served = response.context.unwrap_or(request.context);

    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "route": args.route,
            "status": response.status.as_u16(),
            "context": served,
            "body": response.body,
        }));
    } else {
        ctx.output.header(&format!("GET {}", args.route));
        ctx.output.kv("status", &status_badge(response.status));
        ctx.output.kv("context", served.as_str());
        if let Some(header) = response.header(CONTEXT_HEADER) {
            ctx.output.kv(CONTEXT_HEADER, header);
        }
        let metrics = dispatcher.metrics();
        ctx.output
            .debug(&format!("round trips: {}", metrics.round_trips()));
        ctx.output.info("");
        println!("{}", serde_json::to_string_pretty(&response.body)?);
    }

    if response.is_error() {
        bail!(
            "{} returned {}",
            args.route,
            response.error_code().unwrap_or("an error")
        );
    }

    Ok(())
}

/// Colored badge for an HTTP status.
fn status_badge(status: StatusCode) -> String {
    if status.is_success() {
        style(status).green().to_string()
    } else if status.is_client_error() {
        style(status).yellow().to_string()
    } else {
        style(status).red().to_string()
    }
}
