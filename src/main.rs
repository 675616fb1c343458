//! Shotledger main entry point
//!
//! Command-line interface for the dual-replica shot ingestion pipeline.

use anyhow::Context;
use clap::Parser;
use shotledger::config::{load_config_with_hash, Config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shotledger: dual-replica basketball shot ingestion
///
/// Crawls player, team, and shot data from the upstream stats API into two
/// independent SQLite replicas, and reconciles the replicas against each
/// other. Which stages run is part of the configuration file.
#[derive(Parser, Debug)]
#[command(name = "shotledger")]
#[command(version = "1.0.0")]
#[command(about = "Dual-replica basketball shot ingestion", long_about = None)]
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

    /// Validate config and show what would run without crawling
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) =
        load_config_with_hash(&cli.config).context("failed to load configuration")?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        print_plan(&config);
        return Ok(());
    }

    let summary = shotledger::crawl::execute(config).context("run failed")?;
    println!(
        "Run complete: {} players processed, {} skipped, {} new shots, {} tables dropped",
        summary.players_processed, summary.players_skipped, summary.new_shots, summary.tables_dropped
    );
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shotledger=info,warn"),
            1 => EnvFilter::new("shotledger=debug,info"),
            2 => EnvFilter::new("shotledger=trace,debug"),
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

/// Prints the configured stages and targets without executing anything
fn print_plan(config: &Config) {
    println!("=== Shotledger Dry Run ===\n");

    println!("Replicas:");
    println!("  Players: {} / {}", config.stores.players_primary, config.stores.players_secondary);
    println!("  Shots:   {} / {}", config.stores.shots_primary, config.stores.shots_secondary);

    println!("\nSeason:");
    println!("  Current: {}", config.season.current_season);
    println!("  Type:    {:?}", config.season.season_type);

    println!("\nWorkers: {}", config.worker_count());

    println!("\nStages:");
    let run = &config.run;
    for (name, enabled) in [
        ("sync-directory", run.sync_directory),
        ("backfill-seasons", run.backfill_seasons),
        ("update-seasons", run.update_seasons),
        ("backfill-shots", run.backfill_shots),
        ("update-shots", run.update_shots),
        ("reconcile-players", run.reconcile_players),
        ("reconcile-shots", run.reconcile_shots),
        ("sweep-empty-shot-tables", run.sweep_empty_shot_tables),
    ] {
        println!("  [{}] {}", if enabled { "x" } else { " " }, name);
    }
    if run.drop_mismatched {
        println!("\n! Corrective drops are ENABLED on the primary replica");
    }

    println!("\n✓ Configuration is valid");
}
