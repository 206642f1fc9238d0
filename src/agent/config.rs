//! Agent configuration

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::AgentError;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectionSettings {
    pub interval_secs: u64,
    pub default_location: Option<String>,
    /// Category used when the chassis does not identify a laptop or server
    pub default_category: String,
    pub probe_timeout_secs: u64,
    pub max_parallel_probes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentLoggingSettings {
    pub level: String,
    /// Log to this file instead of stdout
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub collection: CollectionSettings,
    #[serde(default)]
    pub logging: AgentLoggingSettings,
}

impl AgentConfig {
    /// Load from `path` (or the optional `config/agent.toml`), then
    /// `INVENTORY_AGENT_` environment variables, e.g. `INVENTORY_AGENT_API__BASE_URL`
    pub fn load(path: Option<&Path>) -> Result<Self, AgentError> {
        let file = match path {
            Some(path) => File::from(path),
            None => File::with_name("config/agent").required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("INVENTORY_AGENT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| AgentError::Config(e.to_string()))
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl CollectionSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            username: "agent".to_string(),
            password: String::new(),
            timeout_secs: 30,
            retry_attempts: 3,
            retry_backoff_ms: 5000,
        }
    }
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            default_location: None,
            default_category: "pc".to_string(),
            probe_timeout_secs: 60,
            max_parallel_probes: 4,
        }
    }
}

impl Default for AgentLoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.api.retry_attempts, 3);
        assert_eq!(config.collection.probe_timeout(), Duration::from_secs(60));
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_load_missing_explicit_file_is_a_config_error() {
        let result = AgentConfig::load(Some(Path::new("does/not/exist.toml")));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }
}
