use anyhow::Result;
use probe_config::AgentConfig;
use probe_core::{Cache, CollectorRegistry, HttpBackend, Orchestrator, ScrapeConfig};
use probe_metrics::{AgentMetrics, ServiceExporter};
use std::sync::Arc;
use tracing::info;

/// Wires backend, cache, collectors and orchestrator from `config`.
pub fn build_exporter(config: &AgentConfig) -> Result<ServiceExporter> {
    let backend = Arc::new(HttpBackend::new(
        &config.target.url,
        config.target.query_timeout,
    )?);

    let mut scrape = ScrapeConfig::new(backend.clone())
        .with_connection_limit_hint(config.target.connection_limit_hint);

    if let Some(cache_config) = config.cache_config().map_err(anyhow::Error::msg)? {
        info!(
            "Caching query results in {} cache (default TTL {})",
            cache_config.kind,
            humantime::format_duration(cache_config.default_ttl)
        );
        scrape = scrape.with_cache(Arc::new(Cache::from_config(cache_config)));
    }

    let collectors = CollectorRegistry::with_defaults().build(
        &config.const_labels,
        &config.collectors.settings,
        &config.collectors.disabled,
    )?;
    info!("Enabled {} collectors", collectors.len());

    let mut orchestrator = Orchestrator::new(collectors, scrape, config.orchestrator_options())?;
    if config.target.probe_connection_limit {
        orchestrator = orchestrator.with_limit_probe(backend);
    }

    let metrics = Arc::new(AgentMetrics::new()?);

    Ok(ServiceExporter::new(Arc::new(orchestrator), metrics))
}
