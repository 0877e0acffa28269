//! Weather from the latest gridded model run.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

use forecast_grid::{DecoderRegistry, SummaryOptions};
use signal_sources::sources::soft;
use signal_sources::{ForecastResolver, WeatherRequest, WeatherSource};
use signals_common::{ForecastSummary, GeoPoint, SignalError, SignalResult};

/// Resolver plus decoder registry.
///
/// Decoding is CPU-bound and runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct GriddedForecastSource {
    resolver: ForecastResolver,
    registry: Arc<DecoderRegistry>,
    options: SummaryOptions,
}

impl GriddedForecastSource {
    pub fn new(
        resolver: ForecastResolver,
        registry: Arc<DecoderRegistry>,
        options: SummaryOptions,
    ) -> Self {
        Self {
            resolver,
            registry,
            options,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.resolver.is_configured()
    }

    /// Download the latest run and summarize it at `point`.
    ///
    /// A payload that fails to decode is not retried against another
    /// dataset candidate.
    #[instrument(skip(self))]
    pub async fn summary_at(&self, point: GeoPoint) -> SignalResult<ForecastSummary> {
        let payload = self.resolver.fetch_latest().await?;
        info!(
            dataset = %payload.dataset,
            run = %payload.run,
            filename = %payload.filename,
            size = payload.bytes.len(),
            "Decoding gridded forecast"
        );

        let registry = self.registry.clone();
        let options = self.options.clone();
        let bytes = payload.bytes;
        tokio::task::spawn_blocking(move || {
            registry.summarize(&bytes, point, Utc::now(), &options)
        })
        .await
        .map_err(|e| SignalError::Decode(format!("decode task failed: {}", e)))?
    }
}

#[async_trait]
impl WeatherSource for GriddedForecastSource {
    fn name(&self) -> &'static str {
        "gridded"
    }

    async fn summary(&self, request: &WeatherRequest) -> Option<ForecastSummary> {
        if !self.is_configured() {
            debug!("Gridded forecast not configured");
            return None;
        }
        let Some(point) = request.point else {
            debug!(postcode = %request.postcode4, "No coordinates for gridded forecast");
            return None;
        };
        soft("weather", self.summary_at(point).await)
    }
}
