//! Harness configuration.
//!
//! Configuration is loaded from environment variables. Everything except the
//! compute type has a default suited to a host with the agent installed in
//! its standard location and the observability stack port-forwarded locally.

use crate::environment::agent::{DEFAULT_CONFIG_OUTPUT_PATH, DEFAULT_CTL_PATH};
use crate::environment::host::DEFAULT_IMDS_URL;
use crate::environment::{ComputeType, MetaData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Default directory holding agent config files.
pub const DEFAULT_AGENT_CONFIG_DIR: &str = "agent_configs";

/// Default Prometheus base URL.
pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";

/// Default Loki base URL.
pub const DEFAULT_LOKI_URL: &str = "http://localhost:3100";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins if set.
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

/// Harness configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Environment under test.
    pub env: MetaData,

    /// Directory agent config files are read from.
    pub agent_config_dir: PathBuf,

    /// Path the agent reads its active config from.
    pub agent_config_output_path: PathBuf,

    /// Agent control script.
    pub agent_ctl_path: PathBuf,

    /// Metrics backend base URL.
    pub prometheus_url: String,

    /// Logs backend base URL.
    pub loki_url: String,

    /// Instance metadata service base URL.
    pub imds_url: String,

    /// Seed for dimension-set sampling; random when unset.
    pub sampling_seed: Option<u64>,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let compute_type = vars
            .get("COMPUTE_TYPE")
            .map(|raw| ComputeType::parse(raw))
            .ok_or_else(|| ConfigError::MissingEnvVar("COMPUTE_TYPE".to_string()))?;

        let cluster_name = vars.get("EKS_CLUSTER_NAME").cloned().unwrap_or_default();
        if compute_type == ComputeType::Eks && cluster_name.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("EKS_CLUSTER_NAME".to_string()));
        }

        let get_or = |key: &str, default: &str| {
            vars.get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let sampling_seed = match vars.get("SAMPLING_SEED") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                var: "SAMPLING_SEED".to_string(),
                message: format!("must be an unsigned integer, got '{}': {}", raw, e),
            })?),
            None => None,
        };

        let json_logs = match vars.get("JSON_LOGS").map(|v| v.to_ascii_lowercase()) {
            None => false,
            Some(v) if v == "true" || v == "1" => true,
            Some(v) if v == "false" || v == "0" => false,
            Some(v) => {
                return Err(ConfigError::InvalidValue {
                    var: "JSON_LOGS".to_string(),
                    message: format!("must be true/false or 1/0, got '{}'", v),
                })
            }
        };

        Ok(Self {
            env: MetaData {
                compute_type,
                cluster_name,
            },
            agent_config_dir: PathBuf::from(get_or("AGENT_CONFIG_DIR", DEFAULT_AGENT_CONFIG_DIR)),
            agent_config_output_path: PathBuf::from(get_or(
                "AGENT_CONFIG_OUTPUT_PATH",
                DEFAULT_CONFIG_OUTPUT_PATH,
            )),
            agent_ctl_path: PathBuf::from(get_or("AGENT_CTL_PATH", DEFAULT_CTL_PATH)),
            prometheus_url: get_or("PROMETHEUS_URL", DEFAULT_PROMETHEUS_URL),
            loki_url: get_or("LOKI_URL", DEFAULT_LOKI_URL),
            imds_url: get_or("IMDS_URL", DEFAULT_IMDS_URL),
            sampling_seed,
            observability: ObservabilityConfig {
                log_level: get_or("LOG_LEVEL", DEFAULT_LOG_LEVEL),
                json_logs,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_for_ec2() {
        let config = HarnessConfig::from_vars(&vars(&[("COMPUTE_TYPE", "EC2")])).unwrap();

        assert_eq!(config.env, MetaData::ec2());
        assert_eq!(config.agent_config_dir, PathBuf::from("agent_configs"));
        assert_eq!(config.prometheus_url, DEFAULT_PROMETHEUS_URL);
        assert_eq!(config.loki_url, DEFAULT_LOKI_URL);
        assert_eq!(config.sampling_seed, None);
        assert_eq!(config.observability, ObservabilityConfig::default());
    }

    #[test]
    fn test_missing_compute_type_is_an_error() {
        let err = HarnessConfig::from_vars(&HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(var) if var == "COMPUTE_TYPE"));
    }

    #[test]
    fn test_eks_requires_cluster_name() {
        let err = HarnessConfig::from_vars(&vars(&[("COMPUTE_TYPE", "EKS")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(var) if var == "EKS_CLUSTER_NAME"));

        let config = HarnessConfig::from_vars(&vars(&[
            ("COMPUTE_TYPE", "EKS"),
            ("EKS_CLUSTER_NAME", "demo"),
        ]))
        .unwrap();
        assert_eq!(config.env, MetaData::eks("demo"));
    }

    #[test]
    fn test_unrecognized_compute_type_is_not_a_config_error() {
        let config = HarnessConfig::from_vars(&vars(&[("COMPUTE_TYPE", "ECS")])).unwrap();
        assert_eq!(
            config.env.compute_type,
            ComputeType::Unrecognized("ECS".to_string())
        );
    }

    #[test]
    fn test_invalid_seed_rejected() {
        let err = HarnessConfig::from_vars(&vars(&[
            ("COMPUTE_TYPE", "EC2"),
            ("SAMPLING_SEED", "-1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "SAMPLING_SEED"));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = HarnessConfig::from_vars(&vars(&[
            ("COMPUTE_TYPE", "ec2"),
            ("SAMPLING_SEED", "42"),
            ("JSON_LOGS", "true"),
            ("LOG_LEVEL", "debug"),
            ("PROMETHEUS_URL", "http://prom:9090"),
        ]))
        .unwrap();

        assert_eq!(config.sampling_seed, Some(42));
        assert!(config.observability.json_logs);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.prometheus_url, "http://prom:9090");
    }
}
