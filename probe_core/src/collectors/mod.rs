pub mod connections;
pub mod database_size;
pub mod replication;
pub mod wal;

use crate::{
    context::UpdateContext,
    error::{ProbeError, Result},
    observation::MetricSink,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

pub use connections::ConnectionsCollector;
pub use database_size::DatabaseSizeCollector;
pub use replication::ReplicationLagCollector;
pub use wal::WalCollector;

/// Core trait for all collectors
#[async_trait]
pub trait Collector: Send + Sync {
    /// Query the monitored service and send observations to `sink`
    async fn update(&self, ctx: &UpdateContext, sink: &MetricSink) -> Result<()>;

    /// Get the name of this collector
    fn name(&self) -> &str;
}

pub type DynCollector = Arc<dyn Collector>;

/// Labels attached to every observation of one monitored service.
pub type ConstLabels = BTreeMap<String, String>;

/// Free-form per-collector settings from the agent configuration.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CollectorSettings(pub HashMap<String, serde_json::Value>);

impl CollectorSettings {
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub type CollectorFactory =
    Arc<dyn Fn(&ConstLabels, &CollectorSettings) -> Result<Box<dyn Collector>> + Send + Sync>;

#[derive(Default, Clone)]
pub struct CollectorRegistry {
    factories: BTreeMap<String, CollectorFactory>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ConstLabels, &CollectorSettings) -> Result<Box<dyn Collector>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Instantiates every registered collector except those in `disabled`.
    ///
    /// Unknown names in `disabled` are rejected so typos surface at startup.
    pub fn build(
        &self,
        labels: &ConstLabels,
        settings: &HashMap<String, CollectorSettings>,
        disabled: &[String],
    ) -> Result<BTreeMap<String, DynCollector>> {
        let disabled: BTreeSet<&str> = disabled.iter().map(String::as_str).collect();

        if let Some(unknown) = disabled.iter().find(|name| !self.contains(name)) {
            return Err(ProbeError::InvalidConfig(format!(
                "Cannot disable unknown collector '{}'",
                unknown
            )));
        }

        let empty = CollectorSettings::default();
        let mut collectors = BTreeMap::new();

        for (name, factory) in self
            .factories
            .iter()
            .filter(|(name, _)| !disabled.contains(name.as_str()))
        {
            let collector = factory(labels, settings.get(name).unwrap_or(&empty))?;
            debug!("Built collector '{}'", name);
            collectors.insert(name.clone(), DynCollector::from(collector));
        }

        Ok(collectors)
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Register built-in collectors
        registry.register(wal::NAME, |labels, _| {
            Ok(Box::new(WalCollector::new(labels.clone())))
        });
        registry.register(database_size::NAME, |labels, settings| {
            Ok(Box::new(DatabaseSizeCollector::new(
                labels.clone(),
                settings.string_list("exclude_databases"),
            )))
        });
        registry.register(connections::NAME, |labels, _| {
            Ok(Box::new(ConnectionsCollector::new(labels.clone())))
        });
        registry.register(replication::NAME, |labels, _| {
            Ok(Box::new(ReplicationLagCollector::new(labels.clone())))
        });

        registry
    }
}

/// Parses `raw` as a float, logging and skipping values the service returned in an unexpected shape.
pub(crate) fn parse_value(collector: &str, column: &str, raw: Option<&str>) -> Option<f64> {
    let raw = raw?;
    match raw.trim().parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(collector, column, "Skipping unparsable value '{}'", raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let registry = CollectorRegistry::with_defaults();
        let names = registry.list();

        assert!(names.contains(&"wal".to_string()));
        assert!(names.contains(&"database_size".to_string()));
        assert!(names.contains(&"connections".to_string()));
        assert!(names.contains(&"replication_lag".to_string()));
    }

    #[test]
    fn test_build_applies_disable_list() {
        let registry = CollectorRegistry::with_defaults();
        let collectors = registry
            .build(
                &ConstLabels::new(),
                &HashMap::new(),
                &["replication_lag".to_string()],
            )
            .unwrap();

        assert_eq!(collectors.len(), 3);
        assert!(!collectors.contains_key("replication_lag"));
        assert_eq!(collectors["wal"].name(), "wal");
    }

    #[test]
    fn test_build_rejects_unknown_disabled_name() {
        let registry = CollectorRegistry::with_defaults();
        let err = registry
            .build(&ConstLabels::new(), &HashMap::new(), &["wall".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, ProbeError::InvalidConfig(_)));
    }

    #[test]
    fn test_factory_error_propagates() {
        let mut registry = CollectorRegistry::new();
        registry.register("broken", |_, _| {
            Err(ProbeError::InvalidConfig("missing setting".to_string()))
        });

        assert!(registry
            .build(&ConstLabels::new(), &HashMap::new(), &[])
            .is_err());
    }

    #[test]
    fn test_settings_string_list() {
        let mut values = HashMap::new();
        values.insert(
            "exclude_databases".to_string(),
            serde_json::json!(["template0", "template1"]),
        );
        values.insert("roles".to_string(), serde_json::json!("a, b,"));
        let settings = CollectorSettings(values);

        assert_eq!(settings.string_list("exclude_databases"), vec!["template0", "template1"]);
        assert_eq!(settings.string_list("roles"), vec!["a", "b"]);
        assert!(settings.string_list("missing").is_empty());
    }
}
