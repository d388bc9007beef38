use probe_core::{
    cache::{CacheConfig, CacheSettings},
    collectors::{CollectorSettings, ConstLabels},
    orchestrator::OrchestratorOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:9187";
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub target: TargetConfig,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub const_labels: ConstLabels,
    #[serde(default)]
    pub collectors: CollectorsConfig,
    #[serde(default)]
    pub cache: Option<CacheSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: String,
    /// Hard connection cap of the monitored service, `-1` when unknown
    #[serde(default = "default_connection_limit_hint")]
    pub connection_limit_hint: i64,
    /// Ask the service for its connection cap instead of relying on the hint
    #[serde(default = "default_true")]
    pub probe_connection_limit: bool,
    #[serde(with = "probe_core::duration::humantime_format", default = "default_query_timeout")]
    pub query_timeout: Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorsConfig {
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
    #[serde(with = "probe_core::duration::humantime_option", default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub settings: HashMap<String, CollectorSettings>,
}

/// TOML files nest everything under an `[agent]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfigFile {
    pub agent: AgentConfig,
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_connection_limit_hint() -> i64 {
    -1
}

fn default_true() -> bool {
    true
}

fn default_query_timeout() -> Duration {
    DEFAULT_QUERY_TIMEOUT
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), String> {
        let url = self.target.url.trim();
        if url.is_empty() {
            return Err("Target URL cannot be empty".to_string());
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Target URL '{}' must use http or https", url));
        }

        if self.target.query_timeout.is_zero() {
            return Err("Target query timeout must be > 0".to_string());
        }

        self.listen
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid listen address '{}': {}", self.listen, e))?;

        if self.collectors.concurrency_limit == Some(0) {
            return Err("Collector concurrency limit must be > 0".to_string());
        }

        if let Some(timeout) = self.collectors.timeout {
            if timeout.is_zero() {
                return Err("Collector timeout must be > 0".to_string());
            }
        }

        for (i, name) in self.collectors.disabled.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(format!("Disabled collector {} has an empty name", i));
            }
        }

        self.cache_config()?;

        Ok(())
    }

    /// Validated cache configuration, or `None` when caching is off.
    pub fn cache_config(&self) -> Result<Option<CacheConfig>, String> {
        self.cache
            .as_ref()
            .map(|settings| settings.validate().map_err(|e| e.to_string()))
            .transpose()
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        self.listen
            .parse()
            .map_err(|e| format!("Invalid listen address '{}': {}", self.listen, e))
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            concurrency_limit: self.collectors.concurrency_limit,
            collector_timeout: self.collectors.timeout,
            const_labels: self.const_labels.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> AgentConfig {
        AgentConfig {
            target: TargetConfig {
                url: "http://db-gateway:8080".to_string(),
                connection_limit_hint: -1,
                probe_connection_limit: true,
                query_timeout: DEFAULT_QUERY_TIMEOUT,
            },
            listen: default_listen(),
            const_labels: ConstLabels::new(),
            collectors: CollectorsConfig::default(),
            cache: None,
        }
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let config = minimal();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_config().unwrap(), None);
        assert_eq!(config.listen_addr().unwrap().port(), 9187);
    }

    #[test]
    fn test_config_validation() {
        let mut config = minimal();
        config.target.url = "db-gateway:8080".to_string();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.listen = "localhost".to_string();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.collectors.concurrency_limit = Some(0);
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.collectors.timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.cache = Some(CacheSettings {
            ttl: "0s".to_string(),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_orchestrator_options() {
        let mut config = minimal();
        config.collectors.concurrency_limit = Some(4);
        config.collectors.timeout = Some(Duration::from_secs(10));
        config
            .const_labels
            .insert("cluster".to_string(), "main".to_string());

        let options = config.orchestrator_options();
        assert_eq!(options.concurrency_limit, Some(4));
        assert_eq!(options.collector_timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.const_labels["cluster"], "main");
    }
}
