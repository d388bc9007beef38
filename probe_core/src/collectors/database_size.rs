use crate::{
    cache::PendingWrites,
    collectors::{parse_value, Collector, ConstLabels},
    context::UpdateContext,
    error::Result,
    observation::{MetricSink, Observation},
};
use async_trait::async_trait;

pub const NAME: &str = "database_size";

const QUERY: &str =
    "SELECT datname, pg_database_size(datname) AS size_bytes FROM pg_database WHERE datallowconn";

pub struct DatabaseSizeCollector {
    labels: ConstLabels,
    excluded: Vec<String>,
}

impl DatabaseSizeCollector {
    pub fn new(labels: ConstLabels, excluded: Vec<String>) -> Self {
        Self { labels, excluded }
    }
}

#[async_trait]
impl Collector for DatabaseSizeCollector {
    async fn update(&self, ctx: &UpdateContext, sink: &MetricSink) -> Result<()> {
        let mut writes = PendingWrites::new();
        let queried = ctx.query_cached(NAME, QUERY, &[], &mut writes).await;
        writes.wait().await;
        let result = queried?;

        for row in 0..result.len() {
            let Some(datname) = result.cell(row, "datname") else {
                continue;
            };
            if self.excluded.iter().any(|name| name == datname) {
                continue;
            }

            if let Some(size) = parse_value(NAME, "size_bytes", result.cell(row, "size_bytes")) {
                sink.send(
                    Observation::gauge(
                        "probe_database_size_bytes",
                        "Disk space used by the database",
                        size,
                    )
                    .with_label("datname", datname)
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
