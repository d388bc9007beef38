use crate::collector::ScrapeSnapshot;
use anyhow::Result;
use std::path::Path;

pub struct JsonExporter;

impl JsonExporter {
    pub async fn export(snapshot: &ScrapeSnapshot, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn to_string(snapshot: &ScrapeSnapshot) -> Result<String> {
        Ok(serde_json::to_string_pretty(snapshot)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use probe_core::{Observation, ScrapeReport};
    use std::time::Duration;

    #[test]
    fn test_snapshot_to_json() {
        let snapshot = ScrapeSnapshot {
            report: ScrapeReport {
                id: "scrape-1".to_string(),
                started_at: Utc::now(),
                duration: Duration::from_millis(1500),
                concurrency_limit: 2,
                outcomes: vec![],
                forwarded: 1,
                dropped: 0,
            },
            observations: vec![Observation::gauge("probe_up", "Up", 1.0)],
        };

        let json = JsonExporter::to_string(&snapshot).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["report"]["duration"], "1s 500ms");
        assert_eq!(value["observations"][0]["kind"], "gauge");
    }
}
