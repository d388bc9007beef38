use crate::{
    cache::PendingWrites,
    collectors::{parse_value, Collector, ConstLabels},
    context::UpdateContext,
    error::Result,
    observation::{MetricSink, Observation},
};
use async_trait::async_trait;

pub const NAME: &str = "replication_lag";

const QUERY: &str = "SELECT CASE WHEN pg_is_in_recovery() THEN 1 ELSE 0 END AS is_replica, \
     EXTRACT(EPOCH FROM now() - pg_last_xact_replay_timestamp()) AS lag_seconds";

pub struct ReplicationLagCollector {
    labels: ConstLabels,
}

impl ReplicationLagCollector {
    pub fn new(labels: ConstLabels) -> Self {
        Self { labels }
    }
}

#[async_trait]
impl Collector for ReplicationLagCollector {
    async fn update(&self, ctx: &UpdateContext, sink: &MetricSink) -> Result<()> {
        let mut writes = PendingWrites::new();
        let queried = ctx.query_cached(NAME, QUERY, &[], &mut writes).await;
        writes.wait().await;
        let result = queried?;

        if let Some(is_replica) = parse_value(NAME, "is_replica", result.cell(0, "is_replica")) {
            sink.send(
                Observation::gauge(
                    "probe_replication_is_replica",
                    "Whether the service is replaying from a primary",
                    is_replica,
                )
                .with_labels(&self.labels),
            )
            .await?;
        }

        // NULL on primaries and on replicas that have not replayed anything yet
        if let Some(lag) = parse_value(NAME, "lag_seconds", result.cell(0, "lag_seconds")) {
            sink.send(
                Observation::gauge(
                    "probe_replication_lag_seconds",
                    "Seconds since the last replayed transaction",
                    lag.max(0.0),
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
