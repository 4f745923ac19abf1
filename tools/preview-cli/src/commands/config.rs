//! Configuration management commands.

use std::collections::HashSet;
use std::fs;

use anyhow::{bail, Result};
use dialoguer::Confirm;
use preview_core::FieldId;
use preview_session::normalize_api_root;

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::{Context, CONFIG_NAMES};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { theme, force } => init_config(&theme, force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    ctx.output.info("");
    ctx.output.info("[preview]");
    ctx.output.kv("theme", &ctx.config.preview.theme);
    ctx.output.kv("rest_api_root", &ctx.config.preview.rest_api_root);
    ctx.output.kv(
        "session_duration_secs",
        &ctx.config.preview.session_duration_secs.to_string(),
    );

    ctx.output.info("");
    ctx.output.info("[sync]");
    ctx.output.kv("debounce_ms", &ctx.config.sync.debounce_ms.to_string());

    if let Some(ref path) = ctx.config.fixtures.path {
        ctx.output.info("");
        ctx.output.info("[fixtures]");
        ctx.output.kv("path", path);
    }

    if !ctx.config.bindings.is_empty() {
        ctx.output.info("");
        ctx.output.info("Bindings:");
        for binding in &ctx.config.bindings {
            ctx.output
                .list_item(&format!("{} -> {}", binding.field, binding.route));
        }
    }

    Ok(())
}

fn init_config(theme: &str, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        if ctx.output.is_json() {
            bail!(
                "Config file already exists: {}. Use --force to overwrite.",
                config_path.display()
            );
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Overwrite {}?", config_path.display()))
            .default(false)
            .interact()?;
        if !confirmed {
            ctx.output.warn("Init cancelled");
            return Ok(());
        }
    }

    fs::write(&config_path, generate_default_config(theme))?;
    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if ctx.config.preview.theme.trim().is_empty() {
        errors.push("preview.theme is required".to_string());
    }

    if let Err(e) = normalize_api_root(&ctx.config.preview.rest_api_root) {
        errors.push(format!("preview.rest_api_root: {}", e));
    }

    if ctx.config.preview.session_duration_secs <= 0 {
        errors.push("preview.session_duration_secs must be positive".to_string());
    }

    if ctx.config.sync.debounce_ms == 0 {
        warnings.push("sync.debounce_ms is 0; every edit will trigger a request".to_string());
    }

    let routes: HashSet<String> = match ctx.fixtures() {
        Ok(fixtures) => fixtures.routes.into_keys().collect(),
        Err(e) => {
            errors.push(format!("fixtures: {:#}", e));
            HashSet::new()
        }
    };

    let mut seen: HashSet<FieldId> = HashSet::new();
    for (i, binding) in ctx.config.bindings.iter().enumerate() {
        if !binding.route.starts_with('/') {
            errors.push(format!("bindings[{}].route must start with '/'", i));
        }
        match FieldId::parse(&binding.field) {
            Ok(field) => {
                if !field.is_rest_resource() {
                    warnings.push(format!(
                        "bindings[{}].field '{}' is not a rest_resource field and gets no control",
                        i, binding.field
                    ));
                }
                if !seen.insert(field) {
                    warnings.push(format!(
                        "bindings[{}].field '{}' is bound twice; the last binding wins",
                        i, binding.field
                    ));
                }
            }
            Err(e) => errors.push(format!("bindings[{}].field: {}", i, e)),
        }
        if ctx.config.fixtures.path.is_some() && !routes.contains(&binding.route) {
            warnings.push(format!(
                "bindings[{}].route '{}' has no fixture",
                i, binding.route
            ));
        }
    }

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}
