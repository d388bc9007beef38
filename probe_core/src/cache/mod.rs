//! Result cache shared by every collector.
//!
//! One [`Cache`] is built from validated configuration at startup and handed
//! to collectors by `Arc`. Lookups are fail-open: a broken backend behaves
//! like an empty cache, but is counted separately in [`CacheStats`].

pub mod config;
pub mod key;
pub mod memcached;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::query::QueryResult;

pub use config::{parse_servers, parse_ttl, CacheConfig, CacheKind, CacheSettings, MAX_TTL_SECS};
pub use memcached::MemcachedBackend;
pub use memory::MemoryBackend;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: QueryResult,
    pub inserted_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: QueryResult) -> Self {
        Self {
            value,
            inserted_at: Utc::now(),
        }
    }
}

/// Storage behind the cache. Implementations enforce TTLs themselves.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns [`CacheError::Miss`] when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<CacheEntry, CacheError>;

    async fn set(&self, key: &str, value: QueryResult, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    fn hash(&self, parts: &[&dyn Display]) -> String {
        key::hash(parts)
    }

    fn name(&self) -> &str;
}

pub type DynCacheBackend = Arc<dyn CacheBackend>;

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    backend_errors: AtomicU64,
    write_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub backend_errors: u64,
    pub write_errors: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Outcome of [`Cache::lookup`]. An empty `key` means caching is disabled for the call.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub key: String,
    pub hit: Option<CacheEntry>,
}

impl CacheLookup {
    pub fn is_cacheable(&self) -> bool {
        !self.key.is_empty()
    }
}

pub struct Cache {
    backend: DynCacheBackend,
    config: CacheConfig,
    counters: Counters,
}

impl Cache {
    pub fn new(backend: DynCacheBackend, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            counters: Counters::default(),
        }
    }

    /// Builds the backend selected by `config`.
    pub fn from_config(config: CacheConfig) -> Self {
        let backend: DynCacheBackend = match config.kind {
            CacheKind::Memory => Arc::new(MemoryBackend::new(config.sweep_interval)),
            CacheKind::Memcached => Arc::new(MemcachedBackend::new(&config.servers)),
        };
        Self::new(backend, config)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend(&self) -> &DynCacheBackend {
        &self.backend
    }

    pub fn ttl_for(&self, collector: &str) -> Duration {
        self.config.ttl_for(collector)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            backend_errors: self.counters.backend_errors.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Derives the cache key for `discriminators`. Empty when a part cannot be rendered.
    pub fn key(&self, discriminators: &[&dyn Display]) -> String {
        self.backend.hash(discriminators)
    }

    /// Reads `key`. Backend failures are logged, counted and reported as a miss.
    pub async fn lookup(&self, key: String) -> CacheLookup {
        if key.is_empty() {
            return CacheLookup { key, hit: None };
        }

        match self.backend.get(&key).await {
            Ok(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {} (inserted {})", key, entry.inserted_at);
                CacheLookup {
                    key,
                    hit: Some(entry),
                }
            }
            Err(CacheError::Miss) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup { key, hit: None }
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Cache backend '{}' failed on read, treating as miss: {}",
                    self.backend.name(),
                    e
                );
                CacheLookup { key, hit: None }
            }
        }
    }

    /// Schedules a write-back of `value` with the TTL configured for `collector`.
    ///
    /// The write runs inside `writes`, which the calling `update` must drain
    /// with [`PendingWrites::wait`] before it returns. Empty keys are ignored.
    pub fn save(
        self: &Arc<Self>,
        collector: &str,
        writes: &mut PendingWrites,
        key: String,
        value: QueryResult,
    ) {
        if key.is_empty() {
            return;
        }

        let cache = Arc::clone(self);
        let collector = collector.to_string();
        writes.tasks.spawn(async move {
            let ttl = cache.ttl_for(&collector);
            if let Err(e) = cache.backend.set(&key, value, ttl).await {
                cache.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    collector = %collector,
                    "Failed to write query result to cache: {}",
                    e
                );
            }
        });
    }

    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            warn!("Failed to delete cache key {}: {}", key, e);
        }
    }
}

/// Cache writes spawned during one `update` call.
#[derive(Default)]
pub struct PendingWrites {
    tasks: JoinSet<()>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every scheduled write. Write failures were already logged.
    pub async fn wait(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Cache write task failed: {}", e);
            }
        }
    }
}
