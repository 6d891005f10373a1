use super::schema::ReplayConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Failed to parse config file: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./reprise.yaml
    /// 2. ./config.json
    /// 3. ~/.reprise/config.yaml
    /// 4. Default configuration
    pub async fn load_default() -> Result<ReplayConfig, ConfigError> {
        for local in ["./reprise.yaml", "./config.json"] {
            let path = PathBuf::from(local);
            if path.exists() {
                return Self::load_from(&path).await;
            }
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".reprise").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(ReplayConfig::default())
    }

    /// Load a YAML or JSON document, chosen by file extension.
    pub async fn load_from(path: &Path) -> Result<ReplayConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::parse_json(&content)?
        } else {
            Self::parse_yaml(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn parse_yaml(content: &str) -> Result<ReplayConfig, ConfigError> {
        if content.trim().is_empty() {
            return Ok(ReplayConfig::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn parse_json(content: &str) -> Result<ReplayConfig, ConfigError> {
        if content.trim().is_empty() {
            return Ok(ReplayConfig::default());
        }
        Ok(serde_json::from_str(content)?)
    }
}
