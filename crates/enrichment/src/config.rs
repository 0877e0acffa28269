//! Enrichment configuration.
//!
//! Every endpoint and credential is explicit. A missing value disables the
//! corresponding signal instead of failing the whole aggregation.
//!
//! ```yaml
//! open_data:
//!   api_key: "..."
//!   candidates:
//!     - { dataset: harmonie_arome_cy43_p1, version: "2" }
//! openweather:
//!   api_key: "..."
//! confidence_url: https://opendata.cbs.nl/ODataApi/odata/83693NED/TypedDataSet
//! news_feed_url: https://feeds.nos.nl/nosnieuwseconomie
//! holidays_ics_url: https://example.nl/holidays.ics
//! cache:
//!   enabled: true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use forecast_grid::SummaryOptions;
use signal_sources::news::DEFAULT_HEADLINES;
use signal_sources::{open_data, openweather, DatasetCandidate, Timeouts};
use signals_common::StoreDirectory;

/// Environment variables read by [`EnrichmentConfig::from_env`].
pub mod env_keys {
    pub const OPEN_DATA_API_KEY: &str = "KNMI_API_KEY";
    pub const OPENWEATHER_API_KEY: &str = "OPENWEATHER_API_KEY";
    pub const CONFIDENCE_URL: &str = "CBS_CONFIDENCE_URL";
    pub const NEWS_FEED_URL: &str = "ECON_NEWS_RSS";
    pub const HOLIDAYS_ICS_URL: &str = "HOLIDAYS_NL_ICS_URL";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("HTTP client setup failed: {0}")]
    Http(String),
}

/// Gridded model platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenDataConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Tried in order; the first one with a published run is used.
    pub candidates: Vec<DatasetCandidate>,
}

impl Default for OpenDataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: open_data::DEFAULT_BASE_URL.to_string(),
            candidates: signal_sources::default_candidates(),
        }
    }
}

/// Generic weather API, the second link of the weather chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenWeatherConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub country: String,
    /// Leading 3-hourly steps summarized.
    pub steps: usize,
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: openweather::DEFAULT_BASE_URL.to_string(),
            country: "NL".to_string(),
            steps: openweather::DEFAULT_STEPS,
        }
    }
}

/// Time-to-live per signal, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalTtls {
    pub weather_secs: u64,
    pub confidence_secs: u64,
    pub news_secs: u64,
    pub holidays_secs: u64,
}

impl Default for SignalTtls {
    fn default() -> Self {
        Self {
            weather_secs: 900,
            confidence_secs: 3600,
            news_secs: 1800,
            holidays_secs: 21600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum number of cached entries.
    pub capacity: usize,
    pub ttl: SignalTtls,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 1024,
            ttl: SignalTtls::default(),
        }
    }
}

/// Everything the aggregator needs to reach its sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub open_data: OpenDataConfig,
    pub openweather: OpenWeatherConfig,
    pub confidence_url: Option<String>,
    pub news_feed_url: Option<String>,
    /// Headlines kept from the news feed, at most three.
    pub news_headlines: Option<usize>,
    pub holidays_ics_url: Option<String>,
    pub timeouts: Timeouts,
    pub summary: SummaryOptions,
    pub cache: CacheConfig,
}

impl EnrichmentConfig {
    /// Parse a YAML document; `origin` only labels errors.
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = read(path)?;
        let config = Self::from_yaml_str(&yaml, &path.display().to_string())?;
        info!(path = %path.display(), "Loaded enrichment configuration");
        Ok(config)
    }

    /// Defaults with the deployment secrets taken from the environment.
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    /// Fill credentials and endpoints from the process environment.
    ///
    /// Set, non-empty variables win over values from the file.
    pub fn overlay_env(self) -> Self {
        self.overlay_with(|key| std::env::var(key).ok())
    }

    /// [`overlay_env`](Self::overlay_env) with an explicit lookup.
    pub fn overlay_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get(env_keys::OPEN_DATA_API_KEY) {
            self.open_data.api_key = Some(v);
        }
        if let Some(v) = get(env_keys::OPENWEATHER_API_KEY) {
            self.openweather.api_key = Some(v);
        }
        if let Some(v) = get(env_keys::CONFIDENCE_URL) {
            self.confidence_url = Some(v);
        }
        if let Some(v) = get(env_keys::NEWS_FEED_URL) {
            self.news_feed_url = Some(v);
        }
        if let Some(v) = get(env_keys::HOLIDAYS_ICS_URL) {
            self.holidays_ics_url = Some(v);
        }
        debug!(configured = ?self.configured_signals(), "Applied environment overlay");
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.summary.window_hours <= 0 {
            return Err(ConfigError::Invalid(
                "summary.window_hours must be positive".into(),
            ));
        }
        if self.summary.fallback_steps == 0 {
            return Err(ConfigError::Invalid(
                "summary.fallback_steps must be at least 1".into(),
            ));
        }
        if self.news_headlines.is_some_and(|n| n > DEFAULT_HEADLINES) {
            return Err(ConfigError::Invalid(format!(
                "news_headlines must be at most {}",
                DEFAULT_HEADLINES
            )));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.capacity must be at least 1 when the cache is enabled".into(),
            ));
        }
        if self.open_data.candidates.iter().any(|c| c.dataset.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "open_data.candidates contains an empty dataset name".into(),
            ));
        }
        Ok(())
    }

    /// Names of the sources that have what they need to run.
    pub fn configured_signals(&self) -> Vec<&'static str> {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let mut out = Vec::new();
        if set(&self.open_data.api_key) {
            out.push("gridded");
        }
        if set(&self.openweather.api_key) {
            out.push("openweather");
        }
        if set(&self.confidence_url) {
            out.push("cci");
        }
        if set(&self.news_feed_url) {
            out.push("news");
        }
        if set(&self.holidays_ics_url) {
            out.push("holiday");
        }
        out
    }
}

/// Load a store directory from YAML.
///
/// Accepts either a `stores:` mapping or a bare list of stores.
pub fn load_store_directory(path: &Path) -> Result<StoreDirectory, ConfigError> {
    let yaml = read(path)?;
    parse_store_directory(&yaml, &path.display().to_string())
}

pub fn parse_store_directory(yaml: &str, origin: &str) -> Result<StoreDirectory, ConfigError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Doc {
        Wrapped(StoreDirectory),
        List(Vec<signals_common::StoreInfo>),
    }

    let doc: Doc = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;
    let directory = match doc {
        Doc::Wrapped(d) => d,
        Doc::List(stores) => StoreDirectory::new(stores),
    };

    let mut ids = directory.ids();
    ids.sort_unstable();
    if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
        return Err(ConfigError::Invalid(format!(
            "store id {} listed twice in {}",
            w[0], origin
        )));
    }
    Ok(directory)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
