use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ProbeError, Result};

/// Largest TTL accepted, in seconds. Remote backends take TTLs as a signed 32-bit value.
pub const MAX_TTL_SECS: u64 = i32::MAX as u64;

pub const DEFAULT_TTL: &str = "60s";
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Memory,
    Memcached,
}

impl CacheKind {
    pub fn is_remote(&self) -> bool {
        matches!(self, CacheKind::Memcached)
    }
}

impl FromStr for CacheKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" => Ok(CacheKind::Memory),
            "memcached" | "memcache" => Ok(CacheKind::Memcached),
            other => Err(ProbeError::InvalidConfig(format!(
                "Unsupported cache type '{}', expected 'memory' or 'memcached'",
                other
            ))),
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKind::Memory => write!(f, "memory"),
            CacheKind::Memcached => write!(f, "memcached"),
        }
    }
}

/// Cache settings as written by the operator. Turned into a [`CacheConfig`] by [`CacheSettings::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default = "default_ttl")]
    pub ttl: String,
    #[serde(default)]
    pub collector_ttl: HashMap<String, String>,
    #[serde(default)]
    pub sweep_interval: Option<String>,
}

fn default_kind() -> String {
    "memory".to_string()
}

fn default_ttl() -> String {
    DEFAULT_TTL.to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            server: None,
            ttl: default_ttl(),
            collector_ttl: HashMap::new(),
            sweep_interval: None,
        }
    }
}

impl CacheSettings {
    pub fn validate(&self) -> Result<CacheConfig> {
        let kind: CacheKind = self.kind.parse()?;

        let servers = match (kind.is_remote(), self.server.as_deref()) {
            (true, Some(raw)) => parse_servers(raw)?,
            (true, None) => {
                return Err(ProbeError::InvalidConfig(format!(
                    "Cache type '{}' requires a server list",
                    kind
                )))
            }
            (false, Some(_)) => {
                return Err(ProbeError::InvalidConfig(format!(
                    "Cache type '{}' does not take a server list",
                    kind
                )))
            }
            (false, None) => Vec::new(),
        };

        let default_ttl = parse_ttl(&self.ttl)?;

        let mut collector_ttl = HashMap::with_capacity(self.collector_ttl.len());
        for (name, raw) in &self.collector_ttl {
            let ttl = parse_ttl(raw).map_err(|e| {
                ProbeError::InvalidConfig(format!("TTL for collector '{}': {}", name, e))
            })?;
            collector_ttl.insert(name.clone(), ttl);
        }

        let sweep_interval = match &self.sweep_interval {
            Some(raw) => {
                let interval = humantime::parse_duration(raw.trim()).map_err(|e| {
                    ProbeError::InvalidConfig(format!("Invalid sweep interval '{}': {}", raw, e))
                })?;
                if interval.is_zero() {
                    return Err(ProbeError::InvalidConfig(
                        "Sweep interval must be > 0".to_string(),
                    ));
                }
                interval
            }
            None => DEFAULT_SWEEP_INTERVAL,
        };

        Ok(CacheConfig {
            kind,
            servers,
            default_ttl,
            collector_ttl,
            sweep_interval,
        })
    }
}

/// Validated cache configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub kind: CacheKind,
    pub servers: Vec<String>,
    pub default_ttl: Duration,
    pub collector_ttl: HashMap<String, Duration>,
    pub sweep_interval: Duration,
}

impl CacheConfig {
    pub fn memory(default_ttl: Duration) -> Self {
        Self {
            kind: CacheKind::Memory,
            servers: Vec::new(),
            default_ttl,
            collector_ttl: HashMap::new(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_collector_ttl(mut self, collector: impl Into<String>, ttl: Duration) -> Self {
        self.collector_ttl.insert(collector.into(), ttl);
        self
    }

    /// TTL for `collector`, falling back to the default for unknown names.
    pub fn ttl_for(&self, collector: &str) -> Duration {
        self.collector_ttl
            .get(collector)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

/// Parses a TTL given either as a duration (`"30s"`, `"5m"`) or as bare seconds (`"60"`).
pub fn parse_ttl(raw: &str) -> Result<Duration> {
    let raw = raw.trim();

    let secs = match raw.parse::<i64>() {
        Ok(n) if n < 1 => {
            return Err(ProbeError::InvalidConfig(format!(
                "TTL '{}' must be at least 1 second",
                raw
            )))
        }
        Ok(n) => n as u64,
        Err(_) => {
            let duration = humantime::parse_duration(raw)
                .map_err(|e| ProbeError::InvalidConfig(format!("Invalid TTL '{}': {}", raw, e)))?;
            if duration.subsec_nanos() != 0 {
                return Err(ProbeError::InvalidConfig(format!(
                    "TTL '{}' must be a whole number of seconds",
                    raw
                )));
            }
            duration.as_secs()
        }
    };

    if secs == 0 || secs > MAX_TTL_SECS {
        return Err(ProbeError::InvalidConfig(format!(
            "TTL '{}' must be between 1 and {} seconds",
            raw, MAX_TTL_SECS
        )));
    }

    Ok(Duration::from_secs(secs))
}

/// Parses a comma-separated `host:port` list.
pub fn parse_servers(raw: &str) -> Result<Vec<String>> {
    let mut servers = Vec::new();

    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(ProbeError::InvalidConfig(format!(
                "Empty address in server list '{}'",
                raw
            )));
        }

        let (host, port) = entry.rsplit_once(':').ok_or_else(|| {
            ProbeError::InvalidConfig(format!("Server '{}' is not in host:port form", entry))
        })?;

        if host.trim().is_empty() {
            return Err(ProbeError::InvalidConfig(format!(
                "Server '{}' has an empty host",
                entry
            )));
        }

        match port.parse::<u16>() {
            Ok(p) if p >= 1 => {}
            _ => {
                return Err(ProbeError::InvalidConfig(format!(
                    "Server '{}' port must be in 1..=65535",
                    entry
                )))
            }
        }

        servers.push(entry.to_string());
    }

    Ok(servers)
}
