//! Store context enrichment.
//!
//! Builds the [`EnrichmentContext`](signals_common::EnrichmentContext) for a
//! store: KPI day comparison and peer medians from metric rows, plus the
//! external signals (weather, consumer confidence, news, holiday).
//!
//! ```ignore
//! let config = EnrichmentConfig::load(path)?.overlay_env();
//! let aggregator = Aggregator::from_config(&config)?;
//! let context = aggregator.enrich(&store, &rows, today).await;
//! println!("{}", context.to_json());
//! ```

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod gridded;
pub mod kpi;

pub use aggregator::{Aggregator, AggregatorBuilder, ExternalSignals, NoSource, SignalRequest};
pub use cache::{SignalCache, SignalKind, SignalValue};
pub use config::{
    load_store_directory, parse_store_directory, CacheConfig, ConfigError, EnrichmentConfig,
    OpenDataConfig, OpenWeatherConfig, SignalTtls,
};
pub use gridded::GriddedForecastSource;
pub use kpi::{day_comparison, peer_medians, DayComparison, KpiRow};
