//! Bootstrap blob command.

use anyhow::{Context as _, Result};
use preview_core::FieldId;
use preview_session::{PaneBootstrap, PreviewBootstrap};

use super::BootstrapArgs;
use crate::context::Context;

/// Run the bootstrap command.
pub async fn run(args: BootstrapArgs, ctx: &Context) -> Result<()> {
    let session = ctx.session();
    let root = &ctx.config.preview.rest_api_root;

    if args.pane {
        let server = ctx.server()?;
        let blob = PaneBootstrap::collect(&session, server.as_ref(), root)
            .await
            .context("Failed to build pane bootstrap")?;
        ctx.output.json(&blob);
        return Ok(());
    }

    let mut registry = ctx.registry()?;
    for assignment in args.dirty {
        let field = FieldId::parse(&assignment.field)
            .with_context(|| format!("Invalid field: {}", assignment.field))?;
        registry
            .set_dirty(&field, assignment.value)
            .with_context(|| format!("Cannot seed dirty value for {}", field))?;
    }
    ctx.output
        .debug(&format!("{} binding(s) registered", registry.len()));

    let blob = PreviewBootstrap::collect(&session, &registry, root)
        .context("Failed to build preview bootstrap")?;
    ctx.output.json(&blob);

    Ok(())
}
