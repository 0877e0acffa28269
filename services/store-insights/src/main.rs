//! Store insights command.
//!
//! Loads the enrichment configuration, the store directory and the KPI rows
//! of the current period, then prints the enriched store context as JSON:
//! - KPI day comparison and peer medians
//! - Weather (gridded model run, else the generic weather API)
//! - Consumer confidence, news headlines and today's holiday

mod input;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use enrichment::{load_store_directory, Aggregator, EnrichmentConfig};

#[derive(Parser, Debug)]
#[command(name = "store-insights")]
#[command(about = "Print the enriched context of one store as JSON")]
struct Args {
    /// Store id or display name
    #[arg(short, long, required_unless_present = "list_stores")]
    store: Option<String>,

    /// Store directory (YAML)
    #[arg(long, env = "STORES_FILE", default_value = "config/stores.yaml")]
    stores: PathBuf,

    /// Enrichment configuration (YAML); defaults plus environment when absent
    #[arg(short, long, env = "ENRICHMENT_CONFIG")]
    config: Option<PathBuf>,

    /// KPI rows of the current period for all stores (JSON)
    #[arg(long)]
    kpi_rows: Option<PathBuf>,

    /// Reference day (YYYY-MM-DD), defaults to today in --timezone
    #[arg(long)]
    date: Option<String>,

    /// IANA timezone of the stores
    #[arg(long, env = "STORE_TIMEZONE", default_value = "Europe/Amsterdam")]
    timezone: String,

    /// Print the store names and exit
    #[arg(long)]
    list_stores: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the context; logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let directory = load_store_directory(&args.stores)
        .with_context(|| format!("loading stores from {}", args.stores.display()))?;

    if args.list_stores {
        for name in directory.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let selector = args.store.as_deref().unwrap_or_default();
    let store = input::select_store(&directory, selector)?;
    let tz = input::parse_timezone(&args.timezone)?;
    let today = input::reference_day(args.date.as_deref(), tz)?;

    let config = match &args.config {
        Some(path) => EnrichmentConfig::load(path)?.overlay_env(),
        None => EnrichmentConfig::from_env(),
    };

    let rows = match &args.kpi_rows {
        Some(path) => input::load_kpi_rows(path)?,
        None => Vec::new(),
    };

    info!(
        store = %store.name,
        store_id = store.id,
        date = %today,
        kpi_rows = rows.len(),
        "Building store context"
    );

    let aggregator = Aggregator::from_config(&config)?;
    let context = aggregator.enrich(store, &rows, today).await;

    let json = context.to_json();
    let output = if args.pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        json.to_string()
    };
    println!("{}", output);

    info!(signals = context.signal_count(), "Store context complete");

    Ok(())
}
