use crate::agent::AgentMetrics;
use probe_core::{MetricKind, Observation, Orchestrator, ScrapeReport};
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType, Untyped};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything one scrape produced, in a form the JSON exporter can write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSnapshot {
    pub report: ScrapeReport,
    pub observations: Vec<Observation>,
}

/// Exposes one monitored service's collector set to Prometheus.
pub struct ServiceExporter {
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<AgentMetrics>,
}

impl ServiceExporter {
    pub fn new(orchestrator: Arc<Orchestrator>, metrics: Arc<AgentMetrics>) -> Self {
        Self {
            orchestrator,
            metrics,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn metrics(&self) -> &Arc<AgentMetrics> {
        &self.metrics
    }

    /// Runs one scrape and records it in the agent's own metrics.
    pub async fn scrape(&self) -> ScrapeSnapshot {
        let mut observations = Vec::new();
        let report = self.orchestrator.collect(&mut observations).await;

        self.metrics.observe_scrape(&report);
        if let Some(cache) = &self.orchestrator.config().cache {
            self.metrics.observe_cache(cache.stats());
        }

        debug!(
            "Scrape {} produced {} observations",
            report.id,
            observations.len()
        );

        ScrapeSnapshot {
            report,
            observations,
        }
    }

    /// Scrapes the service and returns its families plus the anchor family.
    pub async fn gather(&self) -> Vec<MetricFamily> {
        let snapshot = self.scrape().await;
        let mut gathered = families(snapshot.observations);
        gathered.push(self.anchor_family());
        gathered.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        gathered
    }

    fn anchor_family(&self) -> MetricFamily {
        let desc = self.orchestrator.describe();

        let mut gauge = Gauge::default();
        gauge.set_value(1.0);

        let mut metric = Metric::default();
        for pair in &desc.const_label_pairs {
            metric.mut_label().push(pair.clone());
        }
        metric.set_gauge(gauge);

        let mut family = MetricFamily::default();
        family.set_name(desc.fq_name.clone());
        family.set_help(desc.help.clone());
        family.set_field_type(MetricType::GAUGE);
        family.mut_metric().push(metric);
        family
    }
}

/// Groups observations into metric families keyed by name.
///
/// The first observation of a name fixes the family's help and kind; later
/// observations with a different kind are dropped.
pub fn families(observations: Vec<Observation>) -> Vec<MetricFamily> {
    let mut grouped: BTreeMap<String, MetricFamily> = BTreeMap::new();

    for observation in observations {
        let field_type = metric_type(observation.kind);

        let family = grouped
            .entry(observation.name.clone())
            .or_insert_with(|| {
                let mut family = MetricFamily::default();
                family.set_name(observation.name.clone());
                family.set_help(observation.help.clone());
                family.set_field_type(field_type);
                family
            });

        if family.get_field_type() != field_type {
            warn!(
                "Dropping '{}' sample: kind {:?} conflicts with earlier samples",
                observation.name, observation.kind
            );
            continue;
        }

        family.mut_metric().push(to_metric(&observation));
    }

    grouped.into_values().collect()
}

fn metric_type(kind: MetricKind) -> MetricType {
    match kind {
        MetricKind::Gauge => MetricType::GAUGE,
        MetricKind::Counter => MetricType::COUNTER,
        MetricKind::Untyped => MetricType::UNTYPED,
    }
}

fn to_metric(observation: &Observation) -> Metric {
    let mut metric = Metric::default();

    for (name, value) in &observation.labels {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        metric.mut_label().push(pair);
    }

    match observation.kind {
        MetricKind::Gauge => {
            let mut gauge = Gauge::default();
            gauge.set_value(observation.value);
            metric.set_gauge(gauge);
        }
        MetricKind::Counter => {
            let mut counter = Counter::default();
            counter.set_value(observation.value);
            metric.set_counter(counter);
        }
        MetricKind::Untyped => {
            let mut untyped = Untyped::default();
            untyped.set_value(observation.value);
            metric.set_untyped(untyped);
        }
    }

    metric
}
