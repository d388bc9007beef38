use crate::{
    cache::PendingWrites,
    collectors::{parse_value, Collector, ConstLabels},
    context::UpdateContext,
    error::Result,
    observation::{MetricSink, Observation},
};
use async_trait::async_trait;

pub const NAME: &str = "wal";

const QUERY: &str = "SELECT count(*) AS segments, sum(size) AS size FROM pg_ls_waldir()";

/// Write-ahead log segment count and total size.
pub struct WalCollector {
    labels: ConstLabels,
}

impl WalCollector {
    pub fn new(labels: ConstLabels) -> Self {
        Self { labels }
    }
}

#[async_trait]
impl Collector for WalCollector {
    async fn update(&self, ctx: &UpdateContext, sink: &MetricSink) -> Result<()> {
        let mut writes = PendingWrites::new();
        let queried = ctx.query_cached(NAME, QUERY, &[], &mut writes).await;
        writes.wait().await;
        let result = queried?;

        for row in 0..result.len() {
            if let Some(segments) = parse_value(NAME, "segments", result.cell(row, "segments")) {
                sink.send(
                    Observation::gauge("probe_wal_segments", "Number of WAL segments", segments)
                        .with_labels(&self.labels),
                )
                .await?;
            }

            if let Some(size) = parse_value(NAME, "size", result.cell(row, "size")) {
                sink.send(
                    Observation::gauge("probe_wal_size_bytes", "Total size of WAL segments", size)
                        .with_labels(&self.labels),
                )
                .await?;
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, StaticBackend};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_wal_observations() {
        let backend = Arc::new(StaticBackend::new().with(
            QUERY,
            &["segments", "size"],
            vec![vec![Some("3"), Some("50331648")]],
        ));
        let (tx, mut rx) = mpsc::channel(8);

        let mut labels = ConstLabels::new();
        labels.insert("cluster".to_string(), "main".to_string());

        WalCollector::new(labels)
            .update(&context(backend), &MetricSink::new(tx))
            .await
            .unwrap();

        let segments = rx.recv().await.unwrap();
        assert_eq!(segments.name, "probe_wal_segments");
        assert_eq!(segments.value, 3.0);
        assert_eq!(segments.labels["cluster"], "main");

        let size = rx.recv().await.unwrap();
        assert_eq!(size.value, 50331648.0);
    }
}
