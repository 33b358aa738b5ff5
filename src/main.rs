//! Marches-Harvester main entry point
//!
//! Command-line interface for the announcement harvester: the crawl loop,
//! the resume-state reset, and the read-only query API server.

use clap::{Parser, Subcommand};
use marches_harvester::config::load_config_or_default;
use marches_harvester::crawler::run_harvest;
use marches_harvester::state::StateStore;
use marches_harvester::storage::MongoSink;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Harvests public-procurement announcements from the marchespublics
/// portal into MongoDB, resuming from the last checkpoint on restart.
#[derive(Parser, Debug)]
#[command(name = "marches-harvester")]
#[command(version = "1.0.0")]
#[command(about = "Resumable public-procurement announcement harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when absent)
    #[arg(short, long, value_name = "CONFIG", default_value = "harvester.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a harvest, resuming from the persisted state
    Run {
        /// Maximum pages to fetch this invocation (absent: run until the
        /// pagination ends)
        #[arg(value_name = "PAGE_LIMIT")]
        page_limit: Option<u32>,

        /// Ignore and overwrite the persisted state, starting at page 1
        #[arg(long)]
        no_resume: bool,
    },

    /// Delete the resume state, forcing the next run to start at page 1
    Reset,

    /// Serve the read-only announcement query API
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match load_config_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Run {
            page_limit,
            no_resume,
        } => handle_run(config, page_limit, no_resume).await?,
        Command::Reset => handle_reset(&config)?,
        Command::Serve => handle_serve(&config).await?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("marches_harvester=info,warn"),
            1 => EnvFilter::new("marches_harvester=debug,info"),
            2 => EnvFilter::new("marches_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the `run` subcommand: one harvest invocation
///
/// A failed run propagates its error out of `main` for a non-zero exit,
/// with the resume state left at the last successful checkpoint.
async fn handle_run(
    config: marches_harvester::Config,
    page_limit: Option<u32>,
    no_resume: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = StateStore::new(&config.state.state_path);
    let sink = MongoSink::connect(&config.storage).await?;

    let summary = run_harvest(&config, &sink, &store, page_limit, no_resume).await?;

    println!(
        "Processed {} page(s), {} record(s): {} inserted, {} updated, {} skipped",
        summary.pages_processed,
        summary.records_seen,
        summary.records_inserted,
        summary.records_updated,
        summary.records_skipped
    );
    Ok(())
}

/// Handles the `reset` subcommand: operator-forced restart from page 1
fn handle_reset(
    config: &marches_harvester::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = StateStore::new(&config.state.state_path);
    store.reset()?;
    println!("Resume state cleared ({})", config.state.state_path);
    Ok(())
}

/// Handles the `serve` subcommand: the query API server
async fn handle_serve(
    config: &marches_harvester::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let sink = MongoSink::connect(&config.storage).await?;
    marches_harvester::api::serve(&config.api, sink).await?;
    Ok(())
}
