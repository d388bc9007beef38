use crate::commands::agent::build_exporter;
use crate::ui;
use anyhow::Result;
use probe_config::parse_config_from_file;
use probe_metrics::exporters::{JsonExporter, PrometheusExporter};
use std::path::PathBuf;
use tracing::{info, warn};

pub async fn execute(config_file: PathBuf, format: String, output: Option<PathBuf>) -> Result<()> {
    if !matches!(format.as_str(), "text" | "json") {
        anyhow::bail!("Unsupported format: {}. Use text or json", format);
    }

    let config = parse_config_from_file(&config_file).await?;
    let exporter = build_exporter(&config)?;

    let snapshot = exporter.scrape().await;
    let report = &snapshot.report;

    info!(
        "Scrape {} finished in {} with {} observations",
        report.id,
        humantime::format_duration(report.duration),
        report.forwarded
    );
    for outcome in report.failed() {
        warn!(
            "Collector '{}' failed: {}",
            outcome.name,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let written = match (format.as_str(), &output) {
        ("json", Some(path)) => {
            JsonExporter::export(&snapshot, path).await?;
            Some(path)
        }
        ("json", None) => {
            print!("{}", JsonExporter::to_string(&snapshot)?);
            None
        }
        ("text", _) => {
            let mut families = probe_metrics::families(snapshot.observations.clone());
            families.extend(exporter.metrics().registry().gather());
            let body = PrometheusExporter::render(&families)?;
            match &output {
                Some(path) => {
                    tokio::fs::write(path, body).await?;
                    Some(path)
                }
                None => {
                    print!("{}", body);
                    None
                }
            }
        }
        _ => anyhow::bail!("Unsupported format: {}. Use text or json", format),
    };

    exporter.orchestrator().shutdown();

    if let Some(path) = written {
        ui::verdict(true, &format!("Scrape written to {}", path.display()));
    }

    Ok(())
}
