//! Gridded forecast decoding and point summaries.
//!
//! Turns a downloaded model payload (GRIB2 or NetCDF, optionally gzip
//! wrapped) into a [`ForecastSummary`] for one location:
//!
//! 1. [`DecoderRegistry`] decodes the payload into a [`Grid`]
//! 2. [`discover`] finds coordinate and physical variable names
//! 3. [`point::nearest_point`] picks the closest grid cell
//! 4. [`summarize_grid`] slices the forecast window and applies [`reduce`]
//!
//! # Example
//!
//! ```ignore
//! use forecast_grid::{DecoderRegistry, SummaryOptions};
//! use signals_common::GeoPoint;
//!
//! let registry = DecoderRegistry::with_available_backends();
//! let summary = registry.summarize(&payload, GeoPoint::new(52.1, 5.2), chrono::Utc::now(), &SummaryOptions::default())?;
//! ```
//!
//! [`ForecastSummary`]: signals_common::ForecastSummary
//! [`Grid`]: signals_common::Grid

pub mod compression;
pub mod decoder;
pub mod discover;
pub mod point;
pub mod reduce;
pub mod summarize;

pub use decoder::{DecoderRegistry, GridDecoder, UnavailableDecoder};
#[cfg(feature = "grib2")]
pub use decoder::Grib2Decoder;
#[cfg(feature = "netcdf")]
pub use decoder::NetCdfDecoder;
pub use discover::discover;
pub use point::{nearest_point, PointIndex};
pub use summarize::{summarize_grid, SummaryOptions};
