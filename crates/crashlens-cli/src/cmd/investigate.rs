use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use crashlens_agent::{
    AnthropicModel, Backends, CodeIndex, DocumentIndex, HttpCodeIndex, HttpDocumentIndex,
    InvestigationConfig, InvestigationReport, Investigator, LocalFileAccessor, NoCodeIndex,
    NoDocumentIndex, Toolbox,
};
use crashlens_core::config::{Config, WarnLevel};
use crashlens_core::seed::InvestigationSeed;
use crashlens_core::store::RcaStore;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct InvestigateArgs {
    /// Crash to investigate
    #[arg(long, required_unless_present = "raw")]
    crash_id: Option<String>,

    /// Repository the crash belongs to
    #[arg(long, required_unless_present = "raw")]
    repository_id: Option<String>,

    /// Repository URL (default: looked up from the registered repository)
    #[arg(long)]
    repository_url: Option<String>,

    /// File holding the stack trace (reads stdin if omitted)
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Treat the input as a full seed block with `crash id:` / `repository id:` lines
    #[arg(long)]
    raw: bool,

    /// Override investigation.max_turns
    #[arg(long)]
    max_turns: Option<u32>,

    /// Override investigation.timeout_secs
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Override model.name
    #[arg(long)]
    model: Option<String>,

    /// Repository checkout that fetch_file reads from
    #[arg(long)]
    checkout: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, args: InvestigateArgs, json: bool) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    apply_overrides(&mut config, &args);

    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid configuration: {}", errors.join("; "));
    }

    let model = AnthropicModel::from_config(&config.model)
        .context("failed to set up the reasoning model")?;

    let db = config.database_path(root);
    let store =
        RcaStore::open(&db).with_context(|| format!("failed to open store at {}", db.display()))?;

    let input = read_input(args.trace.as_deref())?;
    let seed = build_seed(&args, &input, &store)?;

    let checkout = args
        .checkout
        .clone()
        .unwrap_or_else(|| config.checkout_path(root));
    let backends = build_backends(&config, checkout, store)?;

    let investigator = Investigator::new(
        Arc::new(model),
        Arc::new(Toolbox::new(backends)),
        InvestigationConfig::from(&config.investigation),
    );

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt
        .block_on(async {
            let cancel = CancellationToken::new();
            let watcher = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("interrupt received, stopping after the current turn");
                        cancel.cancel();
                    }
                })
            };
            let result = investigator.investigate(&seed, cancel).await;
            watcher.abort();
            result
        })
        .with_context(|| format!("investigation of crash '{}' failed", seed.crash_id))?;

    if json {
        print_json(&report)
    } else {
        print_report(&report);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn apply_overrides(config: &mut Config, args: &InvestigateArgs) {
    if let Some(n) = args.max_turns {
        config.investigation.max_turns = n;
    }
    if let Some(secs) = args.timeout_secs {
        config.investigation.timeout_secs = secs;
    }
    if let Some(model) = &args.model {
        config.model.name = model.clone();
    }
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    let text = match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read trace from {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read trace from stdin")?;
            buf
        }
    };
    if text.trim().is_empty() {
        anyhow::bail!("stack trace is empty");
    }
    Ok(text)
}

/// Build the seed from flags, or parse it from the input with `--raw`.
/// Flags given alongside `--raw` override the parsed marker lines.
fn build_seed(
    args: &InvestigateArgs,
    input: &str,
    store: &RcaStore,
) -> anyhow::Result<InvestigationSeed> {
    let mut seed = if args.raw {
        InvestigationSeed::parse(input)?
    } else {
        InvestigationSeed::new(
            input.trim_end(),
            args.crash_id.clone().unwrap_or_default(),
            args.repository_id.clone().unwrap_or_default(),
            None,
        )
    };

    if let Some(id) = &args.crash_id {
        seed.crash_id = id.clone();
    }
    if let Some(id) = &args.repository_id {
        seed.repository_id = id.clone();
    }
    if let Some(url) = &args.repository_url {
        seed.repository_url = Some(url.clone());
    }
    if seed.crash_id.trim().is_empty() {
        anyhow::bail!("crash id is required");
    }
    if seed.repository_id.trim().is_empty() {
        anyhow::bail!("repository id is required");
    }

    if seed.repository_url.is_none() {
        seed.repository_url = store.get_repository(&seed.repository_id)?.map(|r| r.url);
    }
    Ok(seed)
}

fn build_backends(config: &Config, checkout: PathBuf, store: RcaStore) -> anyhow::Result<Backends> {
    let code_index: Arc<dyn CodeIndex> = match config.code_index.endpoint {
        Some(_) => Arc::new(
            HttpCodeIndex::from_config(&config.code_index)
                .context("failed to set up the code index client")?,
        ),
        None => {
            tracing::warn!("no code index configured; search_code will report it as unavailable");
            Arc::new(NoCodeIndex)
        }
    };
    let documents: Arc<dyn DocumentIndex> = match config.document_index.endpoint {
        Some(_) => Arc::new(
            HttpDocumentIndex::from_config(&config.document_index)
                .context("failed to set up the document index client")?,
        ),
        None => Arc::new(NoDocumentIndex),
    };

    Ok(Backends {
        code_index,
        documents,
        files: Arc::new(LocalFileAccessor::new(checkout)),
        store,
    })
}

fn print_report(report: &InvestigationReport) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("crash {}: {}", report.crash_id, report.status);
    println!(
        "turns: {}  tool calls: {}  elapsed: {:.1}s",
        report.turns,
        report.tool_calls,
        report.elapsed_ms as f64 / 1000.0
    );
    println!(
        "rca saved: {}  diff saved: {}  can open PR: {}",
        yes_no(report.rca_saved),
        yes_no(report.diff_saved),
        yes_no(report.can_create_pr)
    );
    println!(
        "tokens: {} in / {} out",
        report.usage.input_tokens, report.usage.output_tokens
    );
    if let Some(text) = &report.final_text {
        println!("\n{text}");
    }
}
