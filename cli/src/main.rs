//! Cotiza - multi-market product price search.
//!
//! Command line entry point. Prints JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cotiza_core::{AppConfig, CountryCode, FetchMode};
use cotiza_search::{SearchError, SearchPipeline, SearchRequest};
use cotiza_sources::{B2bFeatures, Capability, SourceRegistry, SourceStats, SourceType};
use cotiza_validation::ValidatorStatus;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Search product prices across marketplaces and B2B distributors.
#[derive(Parser, Debug)]
#[command(name = "cotiza", version, about, long_about = None)]
struct Cli {
    /// External source catalog (TOML), merged over the built-in sources
    #[arg(long, global = true, env = "COTIZA_CATALOG_PATH")]
    catalog: Option<PathBuf>,

    /// Configuration file; defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a product in one country or across several.
    Search(SearchArgs),
    /// List registered sources.
    Sources(SourcesArgs),
    /// Show registry statistics and the active validator.
    Stats,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Product to look for
    product: String,

    /// Requester's country code
    #[arg(long, conflicts_with = "countries")]
    country: Option<String>,

    /// Comma-separated country codes for a global search, or ALL
    #[arg(long, value_delimiter = ',')]
    countries: Option<Vec<String>>,

    /// Maximum listings per source
    #[arg(long)]
    max_results: Option<usize>,

    /// Include close matches, not only exact ones
    #[arg(long)]
    alternatives: bool,

    /// Only listings from official sellers
    #[arg(long)]
    official_only: bool,

    /// Generate synthetic listings instead of fetching live pages
    #[arg(long)]
    demo: bool,

    /// Seed for synthetic listings
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct SourcesArgs {
    /// Sources located in or shipping to this country
    #[arg(long)]
    country: Option<String>,

    /// Sources of this type (marketplace, b2b_specialized, brand_direct, ...)
    #[arg(long = "type")]
    source_type: Option<SourceType>,

    /// Sources advertising this capability (technical_specs, bulk_pricing, ...)
    #[arg(long)]
    capability: Option<Capability>,

    /// Sources officially carrying this brand
    #[arg(long)]
    brand: Option<String>,
}

#[derive(Serialize)]
struct StatsReport {
    sources: SourceStats,
    features: B2bFeatures,
    validator: ValidatorStatus,
    fetch_mode: FetchMode,
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cotiza=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::load().context("failed to load config")?,
    };
    config.apply_env_overrides();

    if let Some(catalog) = &cli.catalog {
        config.catalog.path = Some(catalog.clone());
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

async fn run_search(mut config: AppConfig, registry: SourceRegistry, args: SearchArgs) -> Result<ExitCode> {
    if args.demo {
        warn!("demo mode: results are synthetic, not live prices");
        config.scraping.fetch_mode = FetchMode::Synthetic;
    }
    if let Some(seed) = args.seed {
        config.scraping.synthetic_seed = seed;
    }

    let pipeline = SearchPipeline::from_config(&config, registry).context("failed to build search pipeline")?;

    let request = SearchRequest {
        product: args.product,
        country: args.country,
        countries: args.countries,
        max_results: args.max_results,
        alternatives: args.alternatives,
        official_only: args.official_only,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling in-flight fetches");
            on_interrupt.cancel();
        }
    });

    match pipeline.search_with_cancellation(request, cancel).await {
        Ok(response) => {
            print_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ SearchError::InvalidRequest { .. }) => {
            if let Some(payload) = e.invalid_request_payload() {
                print_json(&payload)?;
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("search failed"),
    }
}

fn run_sources(registry: &SourceRegistry, args: SourcesArgs) -> Result<()> {
    let mut sources = match &args.country {
        Some(code) => {
            let country = CountryCode::new(code).with_context(|| format!("invalid country '{code}'"))?;
            registry.get_sources_by_country(&country)
        }
        None => registry.get_prioritized_sources(),
    };

    if let Some(source_type) = args.source_type {
        sources.retain(|s| s.source_type == source_type);
    }
    if let Some(capability) = args.capability {
        sources.retain(|s| s.has_capability(capability));
    }
    if let Some(brand) = &args.brand {
        sources.retain(|s| s.carries_brand(brand));
    }

    info!(count = sources.len(), "listing sources");
    print_json(&sources)
}

fn run_stats(config: &AppConfig, registry: SourceRegistry) -> Result<()> {
    let pipeline = SearchPipeline::from_config(config, registry).context("failed to build search pipeline")?;
    print_json(&StatsReport {
        sources: pipeline.registry().get_stats(),
        features: pipeline.registry().features(),
        validator: pipeline.validator_status(),
        fetch_mode: pipeline.fetch_mode(),
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    info!("Starting Cotiza v{}", env!("CARGO_PKG_VERSION"));

    let registry = SourceRegistry::from_catalog_path(config.catalog.path.as_deref());

    match cli.command {
        Commands::Search(args) => run_search(config, registry, args).await,
        Commands::Sources(args) => run_sources(&registry, args).map(|()| ExitCode::SUCCESS),
        Commands::Stats => run_stats(&config, registry).map(|()| ExitCode::SUCCESS),
    }
}
