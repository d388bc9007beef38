use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::QueryBackend;
use crate::context::{ScrapeConfig, UpdateContext};
use crate::error::{ProbeError, Result};
use crate::query::{Column, QueryResult};

/// Backend answering from a fixed table of canned results, counting every query.
#[derive(Default)]
pub struct StaticBackend {
    results: Mutex<HashMap<String, QueryResult>>,
    queries: AtomicUsize,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, sql: &str, columns: &[&str], rows: Vec<Vec<Option<&str>>>) -> Self {
        let result = QueryResult::new(
            columns.iter().map(|c| Column::new(*c, "text")).collect(),
            rows.into_iter()
                .map(|row| row.into_iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        );
        self.results
            .lock()
            .unwrap()
            .insert(sql.to_string(), result);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBackend for StaticBackend {
    async fn query(&self, sql: &str, _args: &[serde_json::Value]) -> Result<QueryResult> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .ok_or_else(|| ProbeError::Backend(format!("no canned result for {}", sql)))
    }

    fn target(&self) -> &str {
        "static://test"
    }
}

pub fn context(backend: Arc<StaticBackend>) -> UpdateContext {
    UpdateContext::new(
        Arc::new(ScrapeConfig::new(backend)),
        tokio_util::sync::CancellationToken::new(),
    )
}
