//! Sumi-Relay main entry point
//!
//! This is the command-line interface for the Sumi-Relay crawl engine.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sumi_relay::config::{load_config_with_hash, Config, FrontierBackend};
use sumi_relay::crawler::Coordinator;
use sumi_relay::frontier::{Frontier, SqliteFrontier};
use sumi_relay::output::{print_frontier_stats, print_statistics};
use sumi_relay::pipeline::{HtmlAnalyzer, SqliteSink};
use tracing_subscriber::EnvFilter;

const IDLE_POLL: Duration = Duration::from_millis(250);

/// Sumi-Relay: a two-pool crawl engine
///
/// Sumi-Relay pulls URLs from a deduplicating frontier, fetches them with a
/// pool of concurrent workers, and analyzes the responses on a second pool
/// that feeds new URLs back into the frontier and records into a database.
#[derive(Parser, Debug)]
#[command(name = "sumi-relay")]
#[command(version = "1.0.0")]
#[command(about = "A two-pool crawl engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Keep the frontier from a previous run (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Clear the frontier before seeding
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the durable frontier and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Stop once the frontier and both pools have run out of work
    #[arg(long)]
    until_idle: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(&config, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_relay=info,warn"),
            1 => EnvFilter::new("sumi_relay=debug,info"),
            2 => EnvFilter::new("sumi_relay=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the pools and seeds that would be used
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Relay Dry Run ===\n");

    println!("Fetch Pool:");
    println!("  Workers: {}", config.fetch.pool_size);
    println!("  Politeness delay: {}s", config.fetch.politeness_delay);
    println!("  Request timeout: {}s", config.fetch.request_timeout);
    println!("  Idle backoff: {}ms", config.fetch.idle_backoff_ms);

    println!("\nAnalyze Pool:");
    println!("  Workers: {}", config.analyze.pool_size);
    match config.analyze.buffer_soft_limit {
        Some(limit) => println!("  Buffer soft limit: {}", limit),
        None => println!("  Buffer soft limit: none"),
    }
    println!("  Link selector: {}", config.analyzer.link_selector);
    if let Some(selector) = &config.analyzer.item_selector {
        println!("  Item selector: {}", selector);
    }
    println!("  Same host only: {}", config.analyzer.same_host_only);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nStorage:");
    match (&config.frontier.backend, &config.frontier.database_path) {
        (FrontierBackend::Sqlite, Some(path)) => println!("  Frontier: sqlite ({})", path),
        (FrontierBackend::Sqlite, None) => println!("  Frontier: sqlite"),
        (FrontierBackend::Memory, _) => println!("  Frontier: memory"),
    }
    println!("  Records: {}", config.output.database_path);

    println!("\nSeeds ({}):", config.seeds.urls.len());
    for seed in &config.seeds.urls {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        config.seeds.urls.len()
    );
}

/// Handles the --stats mode: shows the state left in a durable frontier
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = match (&config.frontier.backend, &config.frontier.database_path) {
        (FrontierBackend::Sqlite, Some(path)) => path,
        _ => bail!("--stats needs a durable frontier (backend = \"sqlite\")"),
    };

    println!("Frontier database: {}\n", path);
    let frontier = SqliteFrontier::open(Path::new(path))
        .with_context(|| format!("Failed to open frontier {}", path))?;
    print_frontier_stats(&frontier.stats()?);

    let records_path = Path::new(&config.output.database_path);
    if records_path.exists() {
        let sink = SqliteSink::open(records_path)
            .with_context(|| format!("Failed to open records {}", records_path.display()))?;
        println!("  Records stored: {}", sink.count()?);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    let reset = cli.fresh || (config.seeds.reset && !cli.resume);
    if reset {
        tracing::info!("Starting fresh crawl (clearing frontier)");
    } else {
        tracing::info!("Starting crawl (keeping any existing frontier)");
    }

    let analyzer = HtmlAnalyzer::new(&config.analyzer)?;
    let sink = SqliteSink::open(Path::new(&config.output.database_path)).with_context(|| {
        format!(
            "Failed to open records database {}",
            config.output.database_path
        )
    })?;
    let mut coordinator =
        Coordinator::<HtmlAnalyzer>::from_config(config, Arc::new(analyzer), Arc::new(sink))?;
    coordinator.seed(&config.seeds.urls, reset)?;

    let shutdown = shutdown_signal(cli.duration.map(Duration::from_secs));

    let stats = if cli.until_idle {
        coordinator.start()?;
        let outcome = tokio::select! {
            result = coordinator.wait_until_idle(IDLE_POLL) => result,
            _ = shutdown => Ok(()),
        };
        let stats = coordinator.stop().await?;
        outcome?;
        stats
    } else {
        coordinator.run_until(shutdown).await?
    };

    println!();
    print_statistics(&stats);
    Ok(())
}

/// Resolves on Ctrl-C or once the optional run duration has elapsed
async fn shutdown_signal(duration: Option<Duration>) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = interrupt => tracing::info!("Interrupt received, shutting down"),
        _ = deadline => tracing::info!("Run duration elapsed, shutting down"),
    }
}
