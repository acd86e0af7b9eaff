//! Nodecheck Control - CLI for analysing extracted diagnostics bundles.
//!
//! Register an extracted bundle, run the analysis over every node and
//! source, and print the grouped insight report.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nodecheck_common::store::MetadataStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nodecheckctl")]
#[command(about = "Nodecheck - diagnostics bundle analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding run metadata snapshots
    #[arg(long, global = true, default_value = "/tmp/nodecheck")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an extracted diagnostics bundle as a new run
    Register {
        /// Directory the bundle was extracted into
        extract_dir: PathBuf,

        /// Bundle name to record (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Analyse every (node, source) unit of a run
    Analyze {
        /// Run id as printed by `register` or `list`
        run_id: String,
    },

    /// Print the grouped insight report for a run
    Report {
        run_id: String,

        /// Include audit (check) and debug insights
        #[arg(long)]
        all: bool,
    },

    /// List all registered runs
    List,

    /// Clear a run's analysis results so it can be re-analysed
    Reset {
        run_id: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = MetadataStore::new(&cli.data_dir);

    match cli.command {
        Commands::Register { extract_dir, name } => commands::register(&store, extract_dir, name),
        Commands::Analyze { run_id } => commands::analyze(&store, &run_id),
        Commands::Report { run_id, all } => commands::report(&store, &run_id, all),
        Commands::List => commands::list(&store),
        Commands::Reset { run_id } => commands::reset(&store, &run_id),
    }
}
