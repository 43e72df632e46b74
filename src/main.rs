//! Ripple-Harvest main entry point
//!
//! This is the command-line interface for the Ripple-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use ripple_harvest::config::{load_config_with_hash, Config};
use ripple_harvest::crawler::Coordinator;
use ripple_harvest::output::{open_writer, print_statistics};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ripple-Harvest: a polite crawl-and-extract engine
///
/// Ripple-Harvest walks category trees, sitemaps and paginated listings from
/// a few seed URLs, extracts one record per content page and writes a
/// deduplicated dataset.
#[derive(Parser, Debug)]
#[command(name = "ripple-harvest")]
#[command(version)]
#[command(about = "A polite crawl-and-extract engine", long_about = None)]
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

    /// Validate config and list the seeds without crawling
    #[arg(long, conflicts_with = "confirm")]
    dry_run: bool,

    /// Ask for confirmation before crawling
    #[arg(long)]
    confirm: bool,

    /// Write the dataset here instead of the configured output path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(output) = &cli.output {
        config.output.path = output.to_string_lossy().into_owned();
    }

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    if cli.confirm && !confirm_crawl(&config)? {
        println!("Aborted.");
        return Ok(());
    }

    handle_crawl(config, &config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_harvest=info,warn"),
            1 => EnvFilter::new("ripple_harvest=debug,info"),
            2 => EnvFilter::new("ripple_harvest=trace,debug"),
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

fn print_plan(config: &Config) {
    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Max containers: {}", crawler.max_containers);
    println!("  Max items: {}", crawler.max_items);
    println!("  Workers: {}", crawler.worker_count);
    println!("  Requests per second: {}", crawler.requests_per_second);
    println!(
        "  Fetch: {}s timeout, {} attempts",
        crawler.fetch_timeout_secs, crawler.max_fetch_attempts
    );
    println!("  Respect robots.txt: {}", crawler.respect_robots);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput: {} ({:?})", config.output.path, config.output.format);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!(
            "  - {} [{}] {} seeds as {}, discovery {:?}{}",
            source.name,
            source.domain,
            source.seeds.len(),
            source.seed_kind,
            source.discovery,
            if source.fields.is_some() {
                ""
            } else {
                ", generic article fields"
            }
        );
        for seed in &source.seeds {
            println!("    * {}", seed);
        }
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Ripple-Harvest Dry Run ===\n");
    print_plan(config);

    // Compiles selectors and field rules as a real run would
    let coordinator = Coordinator::new(config.clone())?;
    let seeds = coordinator.seeds()?;

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", seeds.len());
    Ok(())
}

/// Prints the plan and asks on stdin whether to proceed
fn confirm_crawl(config: &Config) -> anyhow::Result<bool> {
    print_plan(config);
    print!("\nStart crawling? [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let output = config.output.clone();

    tracing::info!(
        "Sources: {}, total seed URLs: {}",
        config.sources.len(),
        config.sources.iter().map(|s| s.seeds.len()).sum::<usize>()
    );

    let coordinator = Coordinator::new(config)?;
    let abort = coordinator.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let report = match coordinator.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    // A failed crawl leaves any existing dataset untouched
    let mut writer = open_writer(&output, config_hash)
        .with_context(|| format!("failed to open output {}", output.path))?;
    writer.write_records(&report.records)?;
    writer.finish(&report.statistics)?;
    tracing::info!("Wrote {} records to {}", report.records.len(), output.path);

    println!();
    print_statistics(&report.statistics);
    Ok(())
}
