//! Catalog-Sweep main entry point
//!
//! This is the command-line interface for the Catalog-Sweep product extractor.

use catalog_sweep::config::{load_config_with_hash, Config, FetchStrategy, OutputFormat};
use catalog_sweep::crawler::run_sweep;
use catalog_sweep::output::print_summary;
use catalog_sweep::RunStats;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog-Sweep: a sitemap-driven product catalog extractor
///
/// Catalog-Sweep walks brand sitemaps, fetches product pages directly or
/// through a headless browser, and writes one record per product color.
#[derive(Parser, Debug)]
#[command(name = "catalog-sweep")]
#[command(version)]
#[command(about = "A sitemap-driven product catalog extractor", long_about = None)]
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

    /// Validate config and show what would be swept without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Only sweep the named brand (repeatable)
    #[arg(long = "brand", value_name = "NAME")]
    brands: Vec<String>,

    /// Stop after this many records
    #[arg(long, value_name = "N")]
    max_items: Option<u64>,

    /// Override the output path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Override the output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = apply_overrides(&mut config, &cli) {
        tracing::error!("Invalid command line: {}", e);
        return ExitCode::FAILURE;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return ExitCode::SUCCESS;
    }

    handle_sweep(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_sweep=info,warn"),
            1 => EnvFilter::new("catalog_sweep=debug,info"),
            2 => EnvFilter::new("catalog_sweep=trace,debug"),
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

/// Applies command line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<(), catalog_sweep::ConfigError> {
    config.retain_brands(&cli.brands)?;

    if let Some(max_items) = cli.max_items {
        if max_items == 0 {
            return Err(catalog_sweep::ConfigError::Validation(
                "--max-items must be greater than 0".to_string(),
            ));
        }
        config.crawler.max_items = Some(max_items);
    }
    if let Some(output) = &cli.output {
        config.output.path = output.clone();
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    Ok(())
}

/// Handles the --dry-run mode: shows the validated plan
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Sweep Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!(
        "  Max concurrent per domain: {}",
        config.crawler.max_concurrent_per_domain
    );
    println!(
        "  Download delay: {}ms{}",
        config.crawler.download_delay_ms,
        if config.crawler.randomize_delay {
            " (randomized)"
        } else {
            ""
        }
    );
    println!("  Max retries: {}", config.crawler.max_retries);
    if let Some(max_items) = config.crawler.max_items {
        println!("  Max items: {}", max_items);
    }

    println!("\nOutput:");
    println!("  Path: {}", config.output.path.display());
    println!("  Format: {:?}", config.output.format);

    println!("\nBrands ({}):", config.brands.len());
    for brand in &config.brands {
        let strategy = match brand.strategy {
            FetchStrategy::Static => "static",
            FetchStrategy::Rendered => "rendered",
        };
        println!(
            "  - {} ({}, {} routes{})",
            brand.name,
            strategy,
            brand.routes.len(),
            if brand.variants.is_some() {
                ", color variants"
            } else {
                ""
            }
        );
        for sitemap in &brand.sitemaps {
            println!("    * {}", sitemap);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would sweep {} sitemap roots",
        config.brands.iter().map(|b| b.sitemaps.len()).sum::<usize>()
    );
}

/// Handles the main sweep operation
async fn handle_sweep(config: Config) -> ExitCode {
    let max_failure_rate = config.crawler.max_failure_rate;

    tracing::info!(
        "Brands: {}, output: {} ({:?})",
        config.brands.len(),
        config.output.path.display(),
        config.output.format
    );

    let counters = Arc::new(RunStats::new());
    let stats = match run_sweep(config, Arc::clone(&counters)).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Sweep failed: {}", e);
            print_summary(&counters.snapshot());
            return ExitCode::FAILURE;
        }
    };

    print_summary(&stats);

    match max_failure_rate {
        Some(max) if stats.failure_rate() > max => {
            tracing::error!(
                "Failure rate {:.1}% exceeds the allowed {:.1}%",
                stats.failure_rate() * 100.0,
                max * 100.0
            );
            ExitCode::FAILURE
        }
        _ => {
            tracing::info!("Sweep completed successfully");
            ExitCode::SUCCESS
        }
    }
}
