pub mod config;
pub mod parser;

pub use config::{AgentConfig, AgentConfigFile, CollectorsConfig, TargetConfig};
pub use parser::{parse_config_from_file, parse_config_from_str};
