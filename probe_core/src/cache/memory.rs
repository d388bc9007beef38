use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::DEFAULT_SWEEP_INTERVAL;
use super::{CacheBackend, CacheEntry};
use crate::error::CacheError;
use crate::query::QueryResult;

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: CacheEntry,
    expires_at: Instant,
}

type Store = RwLock<HashMap<String, StoredEntry>>;

/// Process-local cache backend.
///
/// Expired entries are invisible to `get` immediately and are physically
/// removed by one sweeper task per backend.
pub struct MemoryBackend {
    entries: Arc<Store>,
    shutdown: CancellationToken,
    sweep_interval: Duration,
    sweeping: bool,
}

impl MemoryBackend {
    /// Creates the backend and, when called inside a Tokio runtime, starts its sweeper.
    ///
    /// A zero `sweep_interval` falls back to [`DEFAULT_SWEEP_INTERVAL`].
    pub fn new(sweep_interval: Duration) -> Self {
        let entries: Arc<Store> = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        let sweep_interval = if sweep_interval.is_zero() {
            warn!("Zero sweep interval, using {:?}", DEFAULT_SWEEP_INTERVAL);
            DEFAULT_SWEEP_INTERVAL
        } else {
            sweep_interval
        };

        let sweeping = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(sweep(
                    Arc::downgrade(&entries),
                    sweep_interval,
                    shutdown.clone(),
                ));
                true
            }
            Err(_) => {
                warn!("No Tokio runtime, expired memory cache entries are only removed by purge_expired");
                false
            }
        };

        Self {
            entries,
            shutdown,
            sweep_interval,
            sweeping,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Whether a background sweeper is running for this backend.
    pub fn is_sweeping(&self) -> bool {
        self.sweeping
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        purge(&self.entries).await
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn purge(entries: &Store) -> usize {
    let now = Instant::now();
    let mut guard = entries.write().await;
    let before = guard.len();
    guard.retain(|_, stored| stored.expires_at > now);
    before - guard.len()
}

async fn sweep(entries: Weak<Store>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(store) = entries.upgrade() else { break };
                let removed = purge(&store).await;
                if removed > 0 {
                    debug!("Swept {} expired cache entries", removed);
                }
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<CacheEntry, CacheError> {
        let guard = self.entries.read().await;
        match guard.get(key) {
            Some(stored) if stored.expires_at > Instant::now() => Ok(stored.entry.clone()),
            _ => Err(CacheError::Miss),
        }
    }

    async fn set(&self, key: &str, value: QueryResult, ttl: Duration) -> Result<(), CacheError> {
        let stored = StoredEntry {
            entry: CacheEntry::new(value),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
