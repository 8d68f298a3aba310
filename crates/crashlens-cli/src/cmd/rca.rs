use crate::output::{excerpt, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use crashlens_core::config::Config;
use crashlens_core::rca::CrashRca;
use crashlens_core::store::RcaStore;
use serde::Serialize;
use std::path::Path;

#[derive(Subcommand)]
pub enum RcaSubcommand {
    /// Show the RCA recorded for a crash
    Show { crash_id: String },
    /// List RCAs, most recently updated first
    List {
        /// Only RCAs with a diff and no pull request yet
        #[arg(long)]
        pr_ready: bool,
    },
    /// Record the pull request opened for an RCA's diff
    SetPr {
        crash_id: String,
        /// Pull request URL
        url: String,
    },
}

/// An RCA plus its derived flags, as emitted by `--json`.
#[derive(Serialize)]
struct RcaView<'a> {
    #[serde(flatten)]
    rca: &'a CrashRca,
    populated: bool,
    can_create_pr: bool,
}

impl<'a> From<&'a CrashRca> for RcaView<'a> {
    fn from(rca: &'a CrashRca) -> Self {
        Self {
            rca,
            populated: rca.is_populated(),
            can_create_pr: rca.can_create_pr(),
        }
    }
}

pub fn run(root: &Path, subcmd: RcaSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let db = config.database_path(root);
    let store =
        RcaStore::open(&db).with_context(|| format!("failed to open store at {}", db.display()))?;

    match subcmd {
        RcaSubcommand::Show { crash_id } => show(&store, &crash_id, json),
        RcaSubcommand::List { pr_ready } => list(&store, pr_ready, json),
        RcaSubcommand::SetPr { crash_id, url } => {
            let rca = store.set_pull_request_url(&crash_id, &url)?;
            if json {
                print_json(&RcaView::from(&rca))?;
            } else {
                println!("Recorded pull request for crash {crash_id}: {url}");
            }
            Ok(())
        }
    }
}

fn show(store: &RcaStore, crash_id: &str, json: bool) -> anyhow::Result<()> {
    let rca = store
        .get_rca(crash_id)?
        .with_context(|| format!("no RCA recorded for crash '{crash_id}'"))?;

    if json {
        return print_json(&RcaView::from(&rca));
    }

    println!("crash:       {}", rca.crash_id);
    println!("rca id:      {}", rca.id);
    println!("updated:     {}", rca.updated_at.to_rfc3339());
    println!("can open PR: {}", if rca.can_create_pr() { "yes" } else { "no" });
    if let Some(url) = &rca.pull_request_url {
        println!("pull request: {url}");
    }

    let sections = [
        ("Description", &rca.description),
        ("Problem identification", &rca.problem_identification),
        ("Data collection", &rca.data_collection),
        ("Root cause", &rca.root_cause_identification),
        ("Solution", &rca.solution),
    ];
    for (title, body) in sections {
        if let Some(body) = body {
            println!("\n## {title}\n{body}");
        }
    }
    if let Some(docs) = rca.supporting_documents.as_ref().filter(|d| !d.is_empty()) {
        println!("\n## Supporting documents");
        for doc in docs {
            println!("- {doc}");
        }
    }
    match &rca.git_diff {
        Some(diff) => println!("\n## Diff\n{diff}"),
        None => println!("\n(no diff saved)"),
    }
    Ok(())
}

fn list(store: &RcaStore, pr_ready: bool, json: bool) -> anyhow::Result<()> {
    let rcas: Vec<CrashRca> = store
        .list_rcas()?
        .into_iter()
        .filter(|r| !pr_ready || r.can_create_pr())
        .collect();

    if json {
        let views: Vec<RcaView<'_>> = rcas.iter().map(RcaView::from).collect();
        return print_json(&views);
    }

    if rcas.is_empty() {
        println!("No RCAs recorded.");
        return Ok(());
    }

    let rows = rcas
        .iter()
        .map(|r| {
            vec![
                r.crash_id.clone(),
                r.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                if r.git_diff.is_some() { "yes" } else { "no" }.to_string(),
                if r.can_create_pr() { "yes" } else { "no" }.to_string(),
                r.root_cause_identification
                    .as_deref()
                    .map(|t| excerpt(t, 60))
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["CRASH", "UPDATED", "DIFF", "PR READY", "ROOT CAUSE"], rows);
    Ok(())
}
