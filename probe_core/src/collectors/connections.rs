use crate::{
    cache::PendingWrites,
    collectors::{parse_value, Collector, ConstLabels},
    context::UpdateContext,
    error::Result,
    observation::{MetricSink, Observation},
};
use async_trait::async_trait;

pub const NAME: &str = "connections";

const QUERY: &str = "SELECT state, count(*) AS count FROM pg_stat_activity GROUP BY state";

/// Client connections grouped by state, plus the service's connection cap when known.
pub struct ConnectionsCollector {
    labels: ConstLabels,
}

impl ConnectionsCollector {
    pub fn new(labels: ConstLabels) -> Self {
        Self { labels }
    }
}

#[async_trait]
impl Collector for ConnectionsCollector {
    async fn update(&self, ctx: &UpdateContext, sink: &MetricSink) -> Result<()> {
        let mut writes = PendingWrites::new();
        let queried = ctx.query_cached(NAME, QUERY, &[], &mut writes).await;
        writes.wait().await;
        let result = queried?;

        for row in 0..result.len() {
            let state = result.cell(row, "state").unwrap_or("unknown");
            if let Some(count) = parse_value(NAME, "count", result.cell(row, "count")) {
                sink.send(
                    Observation::gauge("probe_connections", "Connections by state", count)
                        .with_label("state", state)
                        .with_labels(&self.labels),
                )
                .await?;
            }
        }

        let cap = ctx.config.connection_limit_hint;
        if cap > 0 {
            sink.send(
                Observation::gauge(
                    "probe_connections_max",
                    "Maximum number of connections accepted by the service",
                    cap as f64,
                )
                .with_labels(&self.labels),
            )
            .await?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        NAME
    }
}
