//! Common types and utilities shared across the store signal crates.

pub mod context;
pub mod error;
pub mod grid;
pub mod store;
pub mod summary;
pub mod time;

pub use context::{ConfidenceIndex, EnrichmentContext, KpiTotals, PeerMedian};
pub use error::{SignalError, SignalResult};
pub use grid::{GeoPoint, Grid, Variable};
pub use store::{postcode4, StoreDirectory, StoreInfo};
pub use summary::{percent, ForecastSummary, PartialForecast};
pub use time::{CfTimeUnits, TimeParseError, TimeWindow};
