use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use crashlens_core::config::{Config, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration (defaults filled in)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    if json {
        return print_json(&config);
    }

    let model = &config.model;
    println!("model:          {} ({})", model.name, model.provider);
    println!("api key env:    {}", model.api_key_env);
    println!("base url:       {}", model.base_url);
    println!("max tokens:     {}", model.max_tokens);
    println!(
        "limits:         max_turns={} timeout_secs={} max_top_k={}",
        config.investigation.max_turns,
        config.investigation.timeout_secs,
        config.investigation.max_top_k
    );
    println!(
        "code index:     {}",
        config.code_index.endpoint.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "document index: {}",
        config
            .document_index
            .endpoint
            .as_deref()
            .unwrap_or("(not configured)")
    );
    println!("checkout:       {}", config.checkout_path(root).display());
    println!("database:       {}", config.database_path(root).display());
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
