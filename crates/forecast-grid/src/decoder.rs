//! Pluggable payload decoders.
//!
//! Each scientific format sits behind [`GridDecoder`]. Backends compiled
//! out of this build are represented by [`UnavailableDecoder`], so the
//! registry always lists GRIB2 and NetCDF and can report why one was skipped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use signals_common::{ForecastSummary, GeoPoint, Grid, SignalError, SignalResult};

use crate::compression::maybe_inflate;
use crate::summarize::{summarize_grid, SummaryOptions};

/// A decoder turning a raw payload into a [`Grid`].
pub trait GridDecoder: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this backend can decode anything in this build.
    fn is_available(&self) -> bool;

    fn decode(&self, payload: &[u8]) -> SignalResult<Grid>;
}

/// Stand-in for a backend that isn't compiled in.
#[derive(Debug, Clone)]
pub struct UnavailableDecoder {
    name: &'static str,
    reason: String,
}

impl UnavailableDecoder {
    pub fn new(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            reason: reason.into(),
        }
    }
}

impl GridDecoder for UnavailableDecoder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        false
    }

    fn decode(&self, _payload: &[u8]) -> SignalResult<Grid> {
        Err(SignalError::DecodeUnsupported(format!(
            "{}: {}",
            self.name, self.reason
        )))
    }
}

/// GRIB2 backend.
#[cfg(feature = "grib2")]
#[derive(Debug, Clone)]
pub struct Grib2Decoder {
    tables: grib2_parser::Grib2Tables,
}

#[cfg(feature = "grib2")]
impl Grib2Decoder {
    pub fn new(tables: grib2_parser::Grib2Tables) -> Self {
        Self { tables }
    }
}

#[cfg(feature = "grib2")]
impl Default for Grib2Decoder {
    fn default() -> Self {
        Self::new(grib2_parser::Grib2Tables::standard())
    }
}

#[cfg(feature = "grib2")]
impl GridDecoder for Grib2Decoder {
    fn name(&self) -> &'static str {
        "grib2"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn decode(&self, payload: &[u8]) -> SignalResult<Grid> {
        if !grib2_parser::looks_like_grib(payload) {
            return Err(SignalError::Decode("no GRIB marker in payload".into()));
        }
        grib2_parser::to_grid(bytes::Bytes::copy_from_slice(payload), &self.tables)
            .map_err(|e| SignalError::Decode(format!("grib2: {}", e)))
    }
}

/// NetCDF backend.
#[cfg(feature = "netcdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfDecoder;

#[cfg(feature = "netcdf")]
impl GridDecoder for NetCdfDecoder {
    fn name(&self) -> &'static str {
        "netcdf"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn decode(&self, payload: &[u8]) -> SignalResult<Grid> {
        netcdf_parser::decode(payload).map_err(|e| match e {
            netcdf_parser::NetCdfError::Unsupported(msg) => SignalError::DecodeUnsupported(msg),
            other => SignalError::Decode(format!("netcdf: {}", other)),
        })
    }
}

/// Ordered set of decoders tried in turn.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn GridDecoder>>,
}

impl DecoderRegistry {
    pub fn new(decoders: Vec<Arc<dyn GridDecoder>>) -> Self {
        Self { decoders }
    }

    /// GRIB2 first, then NetCDF, each real or unavailable depending on the
    /// enabled features.
    pub fn with_available_backends() -> Self {
        let registry = Self::new(vec![grib2_backend(), netcdf_backend()]);
        info!(
            backends = ?registry.available(),
            "Decoder registry initialized"
        );
        registry
    }

    /// Names of every registered decoder.
    pub fn names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    /// Names of decoders that can actually decode.
    pub fn available(&self) -> Vec<&'static str> {
        self.decoders
            .iter()
            .filter(|d| d.is_available())
            .map(|d| d.name())
            .collect()
    }

    /// Decode with the first decoder that succeeds.
    ///
    /// Gzip-wrapped payloads are inflated first. Reports the last decoder
    /// failure, or [`SignalError::DecodeUnsupported`] when no backend is
    /// available.
    pub fn decode(&self, payload: &[u8]) -> SignalResult<Grid> {
        let payload = maybe_inflate(payload)?;
        let mut last_error = None;

        for decoder in &self.decoders {
            if !decoder.is_available() {
                debug!(decoder = decoder.name(), "Decoder unavailable, skipping");
                continue;
            }
            match decoder.decode(&payload) {
                Ok(grid) => {
                    debug!(
                        decoder = decoder.name(),
                        variables = grid.data_variable_names().len(),
                        "Decoded payload"
                    );
                    return Ok(grid);
                }
                Err(e) => {
                    debug!(decoder = decoder.name(), error = %e, "Decoder failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SignalError::DecodeUnsupported("no decoder available in this build".into())
        }))
    }

    /// Decode and summarize at `target`.
    pub fn summarize(
        &self,
        payload: &[u8],
        target: GeoPoint,
        now: DateTime<Utc>,
        options: &SummaryOptions,
    ) -> SignalResult<ForecastSummary> {
        let grid = self.decode(payload)?;
        summarize_grid(&grid, target, now, options)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_available_backends()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.names())
            .finish()
    }
}

#[cfg(feature = "grib2")]
fn grib2_backend() -> Arc<dyn GridDecoder> {
    Arc::new(Grib2Decoder::default())
}

#[cfg(not(feature = "grib2"))]
fn grib2_backend() -> Arc<dyn GridDecoder> {
    Arc::new(UnavailableDecoder::new(
        "grib2",
        "built without the `grib2` feature",
    ))
}

#[cfg(feature = "netcdf")]
fn netcdf_backend() -> Arc<dyn GridDecoder> {
    Arc::new(NetCdfDecoder)
}

#[cfg(not(feature = "netcdf"))]
fn netcdf_backend() -> Arc<dyn GridDecoder> {
    Arc::new(UnavailableDecoder::new(
        "netcdf",
        "built without the `netcdf` feature",
    ))
}
