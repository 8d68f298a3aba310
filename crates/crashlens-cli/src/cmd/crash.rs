use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use crashlens_core::config::Config;
use crashlens_core::store::RcaStore;
use crashlens_core::types::{CrashReport, Severity};
use std::path::Path;

#[derive(Subcommand)]
pub enum CrashSubcommand {
    /// Register a crash and create its empty RCA row
    Add {
        /// Component that crashed (e.g. checkout-service)
        #[arg(long)]
        component: String,
        /// Error type (e.g. ConnectTimeout)
        #[arg(long)]
        error_type: String,
        /// low, medium, high or critical
        #[arg(long)]
        severity: String,
        #[arg(long)]
        repository_id: String,
        #[arg(long, default_value = "0")]
        impacted_users: u32,
        #[arg(long)]
        comment: Option<String>,
        /// Pointer (usually a URL) to the raw error log
        #[arg(long)]
        error_log: Option<String>,
    },
    /// Show a registered crash
    Show { id: String },
}

pub fn run(root: &Path, subcmd: CrashSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let db = config.database_path(root);
    let store =
        RcaStore::open(&db).with_context(|| format!("failed to open store at {}", db.display()))?;

    match subcmd {
        CrashSubcommand::Add {
            component,
            error_type,
            severity,
            repository_id,
            impacted_users,
            comment,
            error_log,
        } => {
            let severity: Severity = severity.parse()?;
            let mut crash = CrashReport::new(
                component,
                error_type,
                severity,
                impacted_users,
                repository_id,
            );
            crash.comment = comment;
            crash.error_log = error_log;
            store.insert_crash(&crash).context("failed to register crash")?;

            if json {
                print_json(&crash)?;
            } else {
                println!("Registered crash {}", crash.id);
            }
            Ok(())
        }
        CrashSubcommand::Show { id } => {
            let crash = store
                .get_crash(&id)?
                .with_context(|| format!("crash '{id}' not found"))?;
            if json {
                return print_json(&crash);
            }
            println!("id:             {}", crash.id);
            println!("component:      {}", crash.component);
            println!("error type:     {}", crash.error_type);
            println!("severity:       {}", crash.severity);
            println!("status:         {}", crash.status);
            println!("impacted users: {}", crash.impacted_users);
            println!("repository:     {}", crash.repository_id);
            if let Some(comment) = &crash.comment {
                println!("comment:        {comment}");
            }
            if let Some(log) = &crash.error_log {
                println!("error log:      {log}");
            }
            println!("created:        {}", crash.created_at.to_rfc3339());
            Ok(())
        }
    }
}
