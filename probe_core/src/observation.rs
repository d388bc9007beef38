use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use crate::error::{ProbeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
    Untyped,
}

/// A single sample produced by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub value: f64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Observation {
    pub fn new(kind: MetricKind, name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            value,
            labels: BTreeMap::new(),
        }
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(MetricKind::Gauge, name, help, value)
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(MetricKind::Counter, name, help, value)
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels<'a>(mut self, labels: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (k, v) in labels {
            self.labels.entry(k.clone()).or_insert_with(|| v.clone());
        }
        self
    }

    /// Observations without a name cannot be exposed and are dropped by the drain stage.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Write half of the fan-in channel handed to collectors.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::Sender<Observation>,
}

impl MetricSink {
    pub fn new(tx: mpsc::Sender<Observation>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, observation: Observation) -> Result<()> {
        self.tx
            .send(observation)
            .await
            .map_err(|_| ProbeError::SinkClosed)
    }
}

/// Final destination of a scrape. Only the orchestrator's drain stage writes to it.
pub trait ObservationSink: Send {
    fn accept(&mut self, observation: Observation);
}

impl ObservationSink for Vec<Observation> {
    fn accept(&mut self, observation: Observation) {
        self.push(observation);
    }
}

impl ObservationSink for mpsc::UnboundedSender<Observation> {
    fn accept(&mut self, observation: Observation) {
        if self.send(observation).is_err() {
            tracing::debug!("Output receiver dropped, discarding observation");
        }
    }
}
