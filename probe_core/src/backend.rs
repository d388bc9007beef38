use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::query::QueryResult;

/// Read-only access to the monitored service.
///
/// Implementations are shared by every collector task and must be safe to
/// call concurrently.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, sql: &str, args: &[serde_json::Value]) -> Result<QueryResult>;

    /// Connection target used in cache keys. Must not contain credentials.
    fn target(&self) -> &str;
}

/// Source of the monitored service's hard connection cap.
#[async_trait]
pub trait ConnectionLimitProbe: Send + Sync {
    /// Returns the cap, or a negative value when the service has none.
    async fn connection_limit(&self) -> Result<i64>;
}

pub type DynQueryBackend = Arc<dyn QueryBackend>;

const CONNECTION_LIMIT_QUERY: &str = "SHOW max_connections";

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    args: &'a [serde_json::Value],
}

/// Backend speaking a JSON query protocol over HTTP: `POST <url>/query`.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    target: String,
}

impl HttpBackend {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ProbeError::InvalidConfig(format!("Invalid target URL '{}': {}", url, e)))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let mut endpoint = parsed.clone();
        let path = format!("{}/query", parsed.path().trim_end_matches('/'));
        endpoint.set_path(&path);

        Ok(Self {
            client,
            endpoint,
            target: redact(&parsed),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

/// Strips user info, path and query so the target is safe to log and hash.
fn redact(url: &reqwest::Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port_or_known_default() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn query(&self, sql: &str, args: &[serde_json::Value]) -> Result<QueryResult> {
        debug!("Querying {}: {}", self.target, sql);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&QueryRequest { query: sql, args })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProbeError::Backend(format!(
                "{} returned {}: {}",
                self.target, status, body
            )));
        }

        Ok(response.json::<QueryResult>().await?)
    }

    fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl ConnectionLimitProbe for HttpBackend {
    async fn connection_limit(&self) -> Result<i64> {
        let result = self.query(CONNECTION_LIMIT_QUERY, &[]).await?;
        parse_connection_limit(&result)
    }
}

pub(crate) fn parse_connection_limit(result: &QueryResult) -> Result<i64> {
    let raw = result
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_deref())
        .ok_or_else(|| ProbeError::Backend("empty connection limit result".to_string()))?;

    raw.trim()
        .parse::<i64>()
        .map_err(|e| ProbeError::Backend(format!("invalid connection limit '{}': {}", raw, e)))
}
