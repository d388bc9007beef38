pub mod backend;
pub mod cache;
pub mod collectors;
pub mod context;
pub mod duration;
pub mod error;
pub mod observation;
pub mod orchestrator;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ConnectionLimitProbe, HttpBackend, QueryBackend};
pub use cache::{Cache, CacheBackend, CacheConfig, CacheEntry, CacheKind, CacheSettings, CacheStats};
pub use collectors::{Collector, CollectorRegistry, CollectorSettings, ConstLabels};
pub use context::{ScrapeConfig, UpdateContext};
pub use error::{CacheError, ProbeError, Result};
pub use observation::{MetricKind, MetricSink, Observation, ObservationSink};
pub use orchestrator::{Orchestrator, OrchestratorOptions, ScrapeReport};
pub use query::{Column, QueryResult};

// Re-export commonly used types
pub use async_trait::async_trait;
