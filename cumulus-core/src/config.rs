// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Configuration loading with strict validation.
//!
//! Settings come from an optional YAML file overlaid with `CUMULUS_*`
//! environment variables, and are validated once at startup. Any invalid or
//! missing field results in a ConfigurationError before a client is built.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::polling::{ExponentialBackoff, ExponentialBackoffBuilder};
use crate::types::{LogRetention, StoreId};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cumulus.yaml";

pub const ENV_API_KEY: &str = "CUMULUS_API_KEY";
pub const ENV_STORE: &str = "CUMULUS_STORE";
pub const ENV_REGION: &str = "CUMULUS_REGION";
pub const ENV_ENDPOINT: &str = "CUMULUS_ENDPOINT";
pub const ENV_STORAGE_ENDPOINT: &str = "CUMULUS_STORAGE_ENDPOINT";
pub const ENV_LOG_RETENTION_DAYS: &str = "CUMULUS_LOG_RETENTION_DAYS";
pub const ENV_MAX_WAIT_SECS: &str = "CUMULUS_MAX_WAIT_SECS";

/// Upper bound on how long a deploy may wait for its operation.
const MAX_WAIT_LIMIT_SECS: u64 = 3600;

/// Raw polling configuration as parsed from YAML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPollingConfig {
    #[serde(default = "default_initial_delay_ms")]
    initial_delay_ms: u64,
    #[serde(default = "default_maximum_delay_ms")]
    maximum_delay_ms: u64,
    #[serde(default = "default_scaling")]
    scaling: f64,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_maximum_delay_ms() -> u64 {
    5000
}

fn default_scaling() -> f64 {
    1.5
}

impl Default for RawPollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            maximum_delay_ms: default_maximum_delay_ms(),
            scaling: default_scaling(),
        }
    }
}

/// Raw configuration file (before environment overlay and validation).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    region: Option<String>,
    endpoint: Option<String>,
    storage_endpoint: Option<String>,
    store: Option<String>,
    log_retention_days: Option<u32>,
    max_wait_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    polling: RawPollingConfig,
}

fn default_region() -> String {
    "us".to_string()
}

fn default_max_wait_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// API key. Redacted from Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigurationError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigurationError::MissingRequiredField {
                field: "api_key",
                context: format!("environment variable {}", ENV_API_KEY),
            });
        }
        Ok(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Validated service endpoints and credentials.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: ApiKey,
    pub region: String,
    /// Function registry base URL, without trailing slash.
    pub endpoint: String,
    /// Blob store base URL, without trailing slash.
    pub storage_endpoint: String,
    pub request_timeout: Duration,
}

/// Validated settings for one deploy.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub store: StoreId,
    pub log_retention: Option<LogRetention>,
    pub max_wait: Duration,
    pub polling: ExponentialBackoff,
}

impl DeployConfig {
    /// Deploy settings with defaults for everything but the store.
    pub fn new(store: StoreId) -> Self {
        Self {
            store,
            log_retention: None,
            max_wait: Duration::from_secs(default_max_wait_secs()),
            polling: ExponentialBackoff::default(),
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub client: ClientConfig,
    pub deploy: DeployConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the process environment and an optional file.
    ///
    /// With `path = None` the default file is read if it exists; an explicit
    /// path must exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigurationError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load configuration using `env` to look up variables.
    pub fn load_with_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigurationError> {
        let raw = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::read_file(default)?
                } else {
                    RawConfig::default()
                }
            }
        };

        Self::validate(raw, &env)
    }

    /// Load configuration from a YAML string and `env`.
    pub fn load_string(
        content: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigurationError> {
        let raw = Self::parse(content)?;
        Self::validate(raw, &env)
    }

    fn read_file(path: &Path) -> Result<RawConfig, ConfigurationError> {
        if !path.exists() {
            return Err(ConfigurationError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Parse {
            message: format!("reading {}: {}", path.display(), e),
        })?;

        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<RawConfig, ConfigurationError> {
        // An empty document is a valid, empty configuration.
        if content.trim().is_empty() {
            return Ok(RawConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| ConfigurationError::Parse {
            message: format!("YAML parse error: {}", e),
        })
    }

    /// Overlay the environment on the raw file and validate the result.
    fn validate(
        raw: RawConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigurationError> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_key = ApiKey::new(lookup(ENV_API_KEY).unwrap_or_default())?;

        let region = lookup(ENV_REGION)
            .or(raw.region)
            .unwrap_or_else(default_region);
        if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "region",
                value: region,
                reason: "Region must be alphanumeric with hyphens".to_string(),
            });
        }

        let endpoint = lookup(ENV_ENDPOINT).or(raw.endpoint).ok_or_else(|| {
            ConfigurationError::MissingRequiredField {
                field: "endpoint",
                context: format!("configuration file or environment variable {}", ENV_ENDPOINT),
            }
        })?;
        let endpoint = Self::validate_endpoint("endpoint", endpoint)?;

        let storage_endpoint = match lookup(ENV_STORAGE_ENDPOINT).or(raw.storage_endpoint) {
            Some(url) => Self::validate_endpoint("storage_endpoint", url)?,
            None => endpoint.clone(),
        };

        let store = lookup(ENV_STORE).or(raw.store).ok_or_else(|| {
            ConfigurationError::MissingRequiredField {
                field: "store",
                context: format!("configuration file or environment variable {}", ENV_STORE),
            }
        })?;
        let store = StoreId::new(store)?;

        let log_retention_days = match lookup(ENV_LOG_RETENTION_DAYS) {
            Some(value) => Some(Self::parse_number(ENV_LOG_RETENTION_DAYS, &value)?),
            None => raw.log_retention_days,
        };
        let log_retention = log_retention_days
            .map(LogRetention::from_days)
            .transpose()?;

        let max_wait_secs = match lookup(ENV_MAX_WAIT_SECS) {
            Some(value) => Self::parse_number(ENV_MAX_WAIT_SECS, &value)?,
            None => raw.max_wait_secs.unwrap_or_else(default_max_wait_secs),
        };
        if max_wait_secs == 0 || max_wait_secs > MAX_WAIT_LIMIT_SECS {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "max_wait_secs",
                value: max_wait_secs.to_string(),
                reason: format!("Must be between 1 and {} seconds", MAX_WAIT_LIMIT_SECS),
            });
        }

        let request_timeout_secs = raw
            .request_timeout_secs
            .unwrap_or_else(default_request_timeout_secs);
        if request_timeout_secs == 0 {
            return Err(ConfigurationError::InvalidFieldValue {
                field: "request_timeout_secs",
                value: "0".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }

        let polling = ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(raw.polling.initial_delay_ms))
            .with_maximum_delay(Duration::from_millis(raw.polling.maximum_delay_ms))
            .with_scaling(raw.polling.scaling)
            .build()?;

        Ok(Config {
            client: ClientConfig {
                api_key,
                region,
                endpoint,
                storage_endpoint,
                request_timeout: Duration::from_secs(request_timeout_secs),
            },
            deploy: DeployConfig {
                store,
                log_retention,
                max_wait: Duration::from_secs(max_wait_secs),
                polling,
            },
        })
    }

    fn validate_endpoint(field: &'static str, url: String) -> Result<String, ConfigurationError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigurationError::InvalidFieldValue {
                field,
                value: url,
                reason: "Endpoint must start with http:// or https://".to_string(),
            });
        }
        Ok(url.trim_end_matches('/').to_string())
    }

    fn parse_number<T: std::str::FromStr>(
        variable: &'static str,
        value: &str,
    ) -> Result<T, ConfigurationError> {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::InvalidFieldValue {
                field: variable,
                value: value.to_string(),
                reason: "Must be a non-negative integer".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const VALID_CONFIG: &str = r#"
region: eu
endpoint: https://functions.example.test/v1/
storage_endpoint: https://buckets.example.test
store: artifacts
log_retention_days: 7
max_wait_secs: 60
polling:
  initial_delay_ms: 500
  maximum_delay_ms: 2000
  scaling: 2.0
"#;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG, env(&[(ENV_API_KEY, "secret")]))
            .unwrap();

        assert_eq!(config.client.region, "eu");
        assert_eq!(config.client.endpoint, "https://functions.example.test/v1");
        assert_eq!(config.client.storage_endpoint, "https://buckets.example.test");
        assert_eq!(config.deploy.store.as_str(), "artifacts");
        assert_eq!(config.deploy.log_retention.unwrap().days(), 7);
        assert_eq!(config.deploy.max_wait, Duration::from_secs(60));
        assert_eq!(config.deploy.polling.initial_delay(), Duration::from_millis(500));
        assert_eq!(config.deploy.polling.scaling(), 2.0);
    }

    #[test]
    fn test_defaults_applied() {
        let config = ConfigLoader::load_string(
            "",
            env(&[
                (ENV_API_KEY, "secret"),
                (ENV_STORE, "artifacts"),
                (ENV_ENDPOINT, "http://localhost:9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.client.region, "us");
        assert_eq!(config.client.storage_endpoint, "http://localhost:9000");
        assert_eq!(config.client.request_timeout, Duration::from_secs(30));
        assert_eq!(config.deploy.max_wait, Duration::from_secs(120));
        assert!(config.deploy.log_retention.is_none());
        assert_eq!(config.deploy.polling, ExponentialBackoff::default());
    }

    #[test]
    fn test_missing_api_key() {
        let err = ConfigLoader::load_string(VALID_CONFIG, env(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingRequiredField {
                field: "api_key",
                ..
            }
        ));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let err =
            ConfigLoader::load_string(VALID_CONFIG, env(&[(ENV_API_KEY, "   ")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingRequiredField { .. }
        ));
    }

    #[test]
    fn test_missing_store() {
        let err = ConfigLoader::load_string(
            "endpoint: https://functions.example.test",
            env(&[(ENV_API_KEY, "secret")]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingRequiredField { field: "store", .. }
        ));
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = ConfigLoader::load_string(
            VALID_CONFIG,
            env(&[
                (ENV_API_KEY, "secret"),
                (ENV_STORE, "other-bucket"),
                (ENV_MAX_WAIT_SECS, "5"),
                (ENV_LOG_RETENTION_DAYS, "30"),
            ]),
        )
        .unwrap();

        assert_eq!(config.deploy.store.as_str(), "other-bucket");
        assert_eq!(config.deploy.max_wait, Duration::from_secs(5));
        assert_eq!(config.deploy.log_retention.unwrap().days(), 30);
    }

    #[test]
    fn test_invalid_max_wait() {
        for value in ["0", "3601", "soon"] {
            let result = ConfigLoader::load_string(
                VALID_CONFIG,
                env(&[(ENV_API_KEY, "secret"), (ENV_MAX_WAIT_SECS, value)]),
            );
            assert!(result.is_err(), "max wait {} should be rejected", value);
        }
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = ConfigLoader::load_string(
            "endpoint: ftp://example.test\nstore: artifacts",
            env(&[(ENV_API_KEY, "secret")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_polling() {
        let yaml = r#"
endpoint: https://functions.example.test
store: artifacts
polling:
  initial_delay_ms: 5000
  maximum_delay_ms: 1000
"#;
        let result = ConfigLoader::load_string(yaml, env(&[(ENV_API_KEY, "secret")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "endpoint: https://x.test\nstore: artifacts\nbucket: typo";
        let err = ConfigLoader::load_string(yaml, env(&[(ENV_API_KEY, "secret")])).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));
    }

    #[test]
    fn test_api_key_redacted() {
        let config = ConfigLoader::load_string(VALID_CONFIG, env(&[(ENV_API_KEY, "hunter2")]))
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert_eq!(config.client.api_key.expose(), "hunter2");
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let err = ConfigLoader::load_with_env(
            Some(Path::new("/nonexistent/cumulus.yaml")),
            env(&[(ENV_API_KEY, "secret")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::FileNotFound { .. }));
    }
}
