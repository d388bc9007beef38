use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::backend::DynQueryBackend;
use crate::cache::{key, Cache, PendingWrites};
use crate::error::{ProbeError, Result};
use crate::query::QueryResult;

/// Connection-limit hint meaning "the service did not report a cap".
pub const UNKNOWN_CONNECTION_LIMIT: i64 = -1;

/// Settings shared by every collector of one monitored service.
#[derive(Clone)]
pub struct ScrapeConfig {
    pub backend: DynQueryBackend,
    pub cache: Option<Arc<Cache>>,
    pub connection_limit_hint: i64,
}

impl ScrapeConfig {
    pub fn new(backend: DynQueryBackend) -> Self {
        Self {
            backend,
            cache: None,
            connection_limit_hint: UNKNOWN_CONNECTION_LIMIT,
        }
    }

    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_connection_limit_hint(mut self, hint: i64) -> Self {
        self.connection_limit_hint = hint;
        self
    }

    pub fn target(&self) -> &str {
        self.backend.target()
    }
}

/// Per-call context passed to [`Collector::update`](crate::collectors::Collector::update).
#[derive(Clone)]
pub struct UpdateContext {
    pub config: Arc<ScrapeConfig>,
    pub cancel: CancellationToken,
}

impl UpdateContext {
    pub fn new(config: Arc<ScrapeConfig>, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `sql` against the backend, reading through the cache when one is configured.
    ///
    /// On a miss the result is written back through `writes`; the caller
    /// drains `writes` before returning from `update`.
    pub async fn query_cached(
        &self,
        collector: &str,
        sql: &str,
        args: &[serde_json::Value],
        writes: &mut PendingWrites,
    ) -> Result<QueryResult> {
        let backend = &self.config.backend;

        let Some(cache) = &self.config.cache else {
            return self.query(sql, args).await;
        };

        let cache_key = {
            let rendered_args = key::render_args(args);
            cache.key(&[&collector, &backend.target(), &sql, &rendered_args])
        };
        let lookup = cache.lookup(cache_key).await;

        if let Some(entry) = lookup.hit {
            return Ok(entry.value);
        }

        let result = self.query(sql, args).await?;
        cache.save(collector, writes, lookup.key, result.clone());
        Ok(result)
    }

    /// Runs `sql` without caching, aborting if the scrape is cancelled.
    pub async fn query(&self, sql: &str, args: &[serde_json::Value]) -> Result<QueryResult> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            result = self.config.backend.query(sql, args) => result,
        }
    }
}
