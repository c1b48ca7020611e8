use extract::{FoundryConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const PROJECT_ENDPOINT: &str = "PROJECT_ENDPOINT";
pub const MODEL_DEPLOYMENT: &str = "AGENT_MODEL_DEPLOYMENT_NAME";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub retry: RetryConfig,
    pub paths: PathsConfig,
    pub analysis_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub endpoint: String,
    pub model_deployment: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_version: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub max_polls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// File name inside `data_dir`
    pub input_data_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig {
                endpoint: String::new(),
                model_deployment: String::new(),
                api_key: None,
                api_version: "2025-05-01".to_string(),
                request_timeout_secs: 120,
                poll_interval_secs: 2,
                max_polls: 30,
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            paths: PathsConfig {
                data_dir: PathBuf::from("src/data/input"),
                output_dir: PathBuf::from("src/data/output"),
                input_data_file: "Control3_Environment_Segregation_MockData_v4.xlsx".to_string(),
            },
            analysis_batch_size: analyze::DEFAULT_BATCH_SIZE,
        }
    }
}

impl AppConfig {
    /// Build from the process environment
    pub fn from_env(data_dir: PathBuf, output_dir: PathBuf) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), data_dir, output_dir)
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F, data_dir: PathBuf, output_dir: PathBuf) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mut config = Self::default();

        config.agent.endpoint = require(PROJECT_ENDPOINT)?;
        config.agent.model_deployment = require(MODEL_DEPLOYMENT)?;
        config.agent.api_key = get("AZURE_API_KEY");
        if let Some(version) = get("AGENT_API_VERSION") {
            config.agent.api_version = version;
        }
        if let Some(file) = get("INPUT_DATA_FILE") {
            config.paths.input_data_file = file;
        }

        config.agent.poll_interval_secs = parse_or(&get, "AGENT_POLL_INTERVAL_SECS", config.agent.poll_interval_secs)?;
        config.agent.max_polls = parse_or(&get, "AGENT_MAX_POLLS", config.agent.max_polls)?;
        config.retry.max_retries = parse_or(&get, "AGENT_MAX_RETRIES", config.retry.max_retries)?;
        config.analysis_batch_size = parse_or(&get, "ANALYSIS_BATCH_SIZE", config.analysis_batch_size)?;
        if config.analysis_batch_size == 0 {
            return Err(ConfigError::Invalid {
                var: "ANALYSIS_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        config.paths.data_dir = data_dir;
        config.paths.output_dir = output_dir;
        Ok(config)
    }

    pub fn input_data_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.input_data_file)
    }

    pub fn data_dir(&self) -> &Path {
        &self.paths.data_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.paths.output_dir
    }

    pub fn foundry_config(&self) -> FoundryConfig {
        let mut foundry = FoundryConfig::new(&self.agent.endpoint, &self.agent.model_deployment);
        foundry.api_key = self.agent.api_key.clone();
        foundry.api_version = self.agent.api_version.clone();
        foundry.request_timeout_secs = self.agent.request_timeout_secs;
        foundry.poll_interval_ms = self.agent.poll_interval_secs * 1000;
        foundry.max_polls = self.agent.max_polls;
        foundry
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn build(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned(), "in".into(), "out".into())
    }

    #[test]
    fn test_missing_required_variable_fails() {
        let err = build(&[(PROJECT_ENDPOINT, "https://example.services.ai.azure.com/api/projects/p")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing(MODEL_DEPLOYMENT));

        let err = build(&[(PROJECT_ENDPOINT, "  "), (MODEL_DEPLOYMENT, "gpt-4o")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing(PROJECT_ENDPOINT));
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = build(&[
            (PROJECT_ENDPOINT, "https://example/api/projects/p"),
            (MODEL_DEPLOYMENT, "gpt-4o"),
            ("AGENT_MAX_RETRIES", "5"),
            ("INPUT_DATA_FILE", "mock.xlsx"),
        ])
        .unwrap();

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.agent.max_polls, 30);
        assert_eq!(config.analysis_batch_size, 10);
        assert_eq!(config.input_data_path(), PathBuf::from("in/mock.xlsx"));

        let foundry = config.foundry_config();
        assert_eq!(foundry.poll_interval_ms, 2000);
        assert_eq!(foundry.api_version, "2025-05-01");
        assert!(foundry.api_key.is_none());
    }

    #[test]
    fn test_invalid_number() {
        let err = build(&[
            (PROJECT_ENDPOINT, "https://example/api/projects/p"),
            (MODEL_DEPLOYMENT, "gpt-4o"),
            ("AGENT_MAX_POLLS", "many"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "AGENT_MAX_POLLS", .. }));
    }
}
