//! In-memory TTL cache for external signals.
//!
//! Keys are `(signal, scope)`: the scope is a location key for weather and
//! empty for the location-independent feeds. Expired entries are dropped
//! lazily on read; the LRU bound caps the entry count.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use tokio::sync::RwLock;

use signal_sources::HolidayMap;
use signals_common::{ConfidenceIndex, ForecastSummary};

use crate::config::{CacheConfig, SignalTtls};

/// Which signal an entry belongs to.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum SignalKind {
    Weather,
    Confidence,
    News,
    Holidays,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Weather => "weather",
            SignalKind::Confidence => "cci",
            SignalKind::News => "news",
            SignalKind::Holidays => "holiday",
        }
    }

    fn ttl(&self, ttls: &SignalTtls) -> Duration {
        Duration::from_secs(match self {
            SignalKind::Weather => ttls.weather_secs,
            SignalKind::Confidence => ttls.confidence_secs,
            SignalKind::News => ttls.news_secs,
            SignalKind::Holidays => ttls.holidays_secs,
        })
    }
}

/// A cached signal value.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    Weather(ForecastSummary),
    Confidence(ConfidenceIndex),
    News(Vec<String>),
    Holidays(HolidayMap),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    kind: SignalKind,
    scope: String,
}

struct CachedSignal {
    value: SignalValue,
    inserted_at: Instant,
    ttl: Duration,
}

impl CachedSignal {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

#[derive(Debug, Default)]
pub struct SignalCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expired: AtomicU64,
}

impl SignalCacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }
}

/// Shared, clonable signal cache.
#[derive(Clone)]
pub struct SignalCache {
    cache: Arc<RwLock<LruCache<CacheKey, CachedSignal>>>,
    ttls: SignalTtls,
    stats: Arc<SignalCacheStats>,
}

impl SignalCache {
    pub fn new(capacity: NonZeroUsize, ttls: SignalTtls) -> Self {
        tracing::info!(capacity = capacity.get(), ?ttls, "SignalCache initialized");
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            ttls,
            stats: Arc::new(SignalCacheStats::default()),
        }
    }

    /// Cache per configuration, or `None` when disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        NonZeroUsize::new(config.capacity).map(|capacity| Self::new(capacity, config.ttl))
    }

    pub async fn get(&self, kind: SignalKind, scope: &str) -> Option<SignalValue> {
        let key = CacheKey {
            kind,
            scope: scope.to_string(),
        };
        // LRU reads reorder entries, so even lookups take the write lock.
        let mut cache = self.cache.write().await;

        let hit = match cache.get(&key) {
            Some(entry) if entry.is_expired() => {
                cache.pop(&key);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        };

        if hit.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            counter!("signal_cache_hits_total", "signal" => kind.as_str()).increment(1);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            counter!("signal_cache_misses_total", "signal" => kind.as_str()).increment(1);
        }
        hit
    }

    pub async fn put(&self, kind: SignalKind, scope: &str, value: SignalValue) {
        let key = CacheKey {
            kind,
            scope: scope.to_string(),
        };
        let entry = CachedSignal {
            value,
            inserted_at: Instant::now(),
            ttl: kind.ttl(&self.ttls),
        };
        let mut cache = self.cache.write().await;
        if let Some((evicted, _)) = cache.push(key.clone(), entry) {
            if evicted != key {
                tracing::debug!(signal = evicted.kind.as_str(), scope = %evicted.scope, "SignalCache evicted entry");
            }
        }
    }

    pub fn stats(&self) -> &SignalCacheStats {
        &self.stats
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}

impl std::fmt::Debug for SignalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalCache")
            .field("ttls", &self.ttls)
            .field("stats", &self.stats)
            .finish()
    }
}
