mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, crash::CrashSubcommand, investigate::InvestigateArgs,
    rca::RcaSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "crashlens",
    about = "Automated crash root-cause analysis: investigate a stack trace, save an RCA and a fix",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .crashlens/ or .git/)
    #[arg(long, global = true, env = "CRASHLENS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Investigate a crash and save its RCA (and a fix when one is found)
    Investigate(InvestigateArgs),

    /// Inspect saved root-cause analyses
    Rca {
        #[command(subcommand)]
        subcommand: RcaSubcommand,
    },

    /// Register crashes
    Crash {
        #[command(subcommand)]
        subcommand: CrashSubcommand,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Investigate(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Investigate(args) => cmd::investigate::run(&root, args, cli.json),
        Commands::Rca { subcommand } => cmd::rca::run(&root, subcommand, cli.json),
        Commands::Crash { subcommand } => cmd::crash::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
