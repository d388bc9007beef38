use crate::config::{AgentConfig, AgentConfigFile};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<AgentConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;
    debug!("Loaded configuration from {}", path.display());

    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or_default();

    parse_config_from_str(&contents, extension).map_err(|e| {
        anyhow::anyhow!("{}: {}", path.display(), e)
    })
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<AgentConfig> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "toml" => parse_toml(content),
        "json" => parse_json(content),
        _ => Err(anyhow::anyhow!(
            "Unsupported format '{}'. Use .yaml, .yml, .toml, or .json",
            format
        )),
    }
}

fn parse_yaml(content: &str) -> Result<AgentConfig> {
    let config: AgentConfig = serde_yaml::from_str(content)?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}

fn parse_toml(content: &str) -> Result<AgentConfig> {
    let file: AgentConfigFile = toml::from_str(content)?;
    file.agent.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(file.agent)
}

fn parse_json(content: &str) -> Result<AgentConfig> {
    let config: AgentConfig = serde_json::from_str(content)?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}
