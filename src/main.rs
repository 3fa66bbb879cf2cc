//! recursive-dl main entry point
//!
//! This is the command-line interface for the staged link follower.

use anyhow::Context;
use clap::Parser;
use recursive_dl::config::{
    parse_config_file, validate, validate_seed_url, Config, FetchMode, Overrides,
};
use recursive_dl::output::{print_matches, print_summary, RunSummary};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// recursive-dl: follow links stage by stage and download what the last stage finds
///
/// Each --search token is one stage. Stage 1 keeps the seed page's links whose
/// file name matches its pattern, stage 2 fetches those pages and keeps their
/// matching links, and so on. Alternatives separated by '>' are tried in order
/// until one matches, e.g. --search "*.flac>*.mp3".
#[derive(Parser, Debug)]
#[command(name = "recursive-dl")]
#[command(version = "1.0.0")]
#[command(about = "Recursively follow pattern-matched links and download the results", long_about = None)]
struct Cli {
    /// Starting URL
    #[arg(value_name = "URL")]
    url: String,

    /// Search patterns, one per stage (env SEARCH, whitespace separated)
    #[arg(long, num_args = 1.., value_name = "PATTERN")]
    search: Vec<String>,

    /// How pages are fetched
    #[arg(long, value_enum, env = "MODE")]
    mode: Option<FetchMode>,

    /// Number of parallel workers
    #[arg(short, long, env = "WORKERS")]
    workers: Option<usize>,

    /// Directory downloads are written to
    #[arg(short, long, env = "OUTPUT", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run the traversal and list matches without downloading
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env values act as environment defaults for the arguments below
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    setup_logging(cli.verbose.saturating_add(env_verbosity()), cli.quiet);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}", e);
            return Err(e);
        }
    };
    let seed = validate_seed_url(&cli.url)?;

    tracing::info!(
        "Starting at {} ({} stage(s), mode {}, {} worker(s))",
        seed,
        config.crawl.search.len(),
        config.crawl.mode,
        config.crawl.workers
    );

    let started = Instant::now();
    let output = match recursive_dl::run(&config, &seed, cli.dry_run).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        print_matches(&output.crawl);
    }

    let summary = RunSummary {
        elapsed: Some(started.elapsed()),
        dry_run: cli.dry_run,
        ..RunSummary::new(&output.crawl, &output.downloads)
    };
    print_summary(&summary);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recursive_dl=info,warn"),
            1 => EnvFilter::new("recursive_dl=debug,info"),
            2 => EnvFilter::new("recursive_dl=trace,debug"),
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

/// `VERBOSE=true` in the environment counts as one `-v`
fn env_verbosity() -> u8 {
    match std::env::var("VERBOSE") {
        Ok(value) if matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes") => 1,
        _ => 0,
    }
}

/// Layers defaults, the config file, the environment and the command line
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => parse_config_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };

    let search = if cli.search.is_empty() {
        std::env::var("SEARCH")
            .ok()
            .map(|value| value.split_whitespace().map(str::to_string).collect())
    } else {
        Some(cli.search.clone())
    };

    config.apply_overrides(Overrides {
        search,
        mode: cli.mode,
        workers: cli.workers,
        output: cli.output.clone(),
    });

    validate(&config)?;
    if config.crawl.search.is_empty() {
        anyhow::bail!("no search patterns given; pass --search or set SEARCH");
    }

    Ok(config)
}
