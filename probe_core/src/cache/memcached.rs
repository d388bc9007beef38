use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use super::{CacheBackend, CacheEntry};
use crate::error::CacheError;
use crate::query::QueryResult;

/// Memcached treats expirations above 30 days as absolute Unix timestamps.
const RELATIVE_EXPIRATION_LIMIT: u64 = 60 * 60 * 24 * 30;

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Remote cache backend shared by every agent pointed at the same servers.
///
/// Keys are sharded client-side across all configured servers. The client
/// connects lazily so an unreachable cache never blocks startup.
pub struct MemcachedBackend {
    urls: Arc<Vec<String>>,
    client: Arc<Mutex<Option<Arc<memcache::Client>>>>,
    timeout: Duration,
}

impl MemcachedBackend {
    pub fn new(servers: &[String]) -> Self {
        let urls = servers
            .iter()
            .map(|server| format!("memcache://{}", server))
            .collect();

        Self {
            urls: Arc::new(urls),
            client: Arc::new(Mutex::new(None)),
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Drops the pooled client so the next operation reconnects.
    fn reset(&self) {
        if let Ok(mut guard) = self.client.lock() {
            guard.take();
        }
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&memcache::Client) -> Result<T, memcache::MemcacheError> + Send + 'static,
    {
        let slot = Arc::clone(&self.client);
        let urls = Arc::clone(&self.urls);
        let task = tokio::task::spawn_blocking(move || -> Result<T, String> {
            let client = acquire(&slot, &urls)?;
            f(&client).map_err(|e| e.to_string())
        });

        let outcome = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(value))) => return Ok(value),
            Ok(Ok(Err(e))) => format!("memcached {} failed: {}", op, e),
            Ok(Err(join)) => format!("memcached {} task failed: {}", op, join),
            Err(_) => format!("memcached {} timed out after {:?}", op, self.timeout),
        };

        self.reset();
        Err(CacheError::Backend(outcome))
    }
}

fn acquire(
    slot: &Mutex<Option<Arc<memcache::Client>>>,
    urls: &[String],
) -> Result<Arc<memcache::Client>, String> {
    let mut guard = slot
        .lock()
        .map_err(|_| "memcached client lock poisoned".to_string())?;

    if let Some(client) = guard.as_ref() {
        return Ok(client.clone());
    }

    let client = memcache::Client::connect(urls.to_vec())
        .map_err(|e| format!("connect to {:?}: {}", urls, e))?;
    info!("Connected to memcached servers {:?}", urls);

    let client = Arc::new(client);
    *guard = Some(client.clone());
    Ok(client)
}

/// Converts a TTL into the memcached expiration field.
pub(crate) fn expiration_for(ttl: Duration, now_unix: u64) -> u32 {
    let secs = ttl.as_secs().max(1);
    let expiration = if secs > RELATIVE_EXPIRATION_LIMIT {
        now_unix.saturating_add(secs)
    } else {
        secs
    };
    expiration.min(u32::MAX as u64) as u32
}

/// Wire form of a stored entry: JSON `{value, inserted_at}`.
pub(crate) fn encode_entry(value: QueryResult) -> Result<String, CacheError> {
    Ok(serde_json::to_string(&CacheEntry::new(value))?)
}

/// Absent keys are a miss; an unreadable payload is a serialization error.
pub(crate) fn decode_payload(payload: Option<String>) -> Result<CacheEntry, CacheError> {
    match payload {
        Some(raw) => Ok(serde_json::from_str::<CacheEntry>(&raw)?),
        None => Err(CacheError::Miss),
    }
}

#[async_trait]
impl CacheBackend for MemcachedBackend {
    async fn get(&self, key: &str) -> Result<CacheEntry, CacheError> {
        let owned = key.to_string();
        let payload: Option<String> = self.run("get", move |c| c.get(&owned)).await?;
        decode_payload(payload)
    }

    async fn set(&self, key: &str, value: QueryResult, ttl: Duration) -> Result<(), CacheError> {
        let payload = encode_entry(value)?;
        let now_unix = chrono::Utc::now().timestamp().max(0) as u64;
        let expiration = expiration_for(ttl, now_unix);
        let owned = key.to_string();

        debug!("Storing {} bytes under {} (expiration {})", payload.len(), key, expiration);
        self.run("set", move |c| c.set(&owned, payload.as_str(), expiration))
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let owned = key.to_string();
        self.run("delete", move |c| c.delete(&owned).map(|_| ()))
            .await
    }

    fn name(&self) -> &str {
        "memcached"
    }
}
