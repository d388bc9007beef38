use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Collector '{name}' failed: {message}")]
    Collector { name: String, message: String },

    #[error("Collector '{0}' timed out")]
    Timeout(String),

    #[error("Collection cancelled")]
    Cancelled,

    #[error("Observation sink closed")]
    SinkClosed,

    #[error("Query backend error: {0}")]
    Backend(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metric descriptor error: {0}")]
    Descriptor(#[from] prometheus::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProbeError {
    pub fn collector(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Collector {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

/// Errors surfaced by cache backends.
///
/// `Miss` is the normal "not present" outcome and is never logged as a failure.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
