//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the delay analytics toolkit: cluster
//! connection settings, ingestion tuning, corpus index location, and
//! logging. Configuration is built once at startup and passed by reference
//! to the components that need it; business logic never reads the
//! environment on its own.
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration file (TOML)
//! 3. Default values (lowest priority)
//!
//! ## Cluster Credential
//! The cluster API key is mandatory for every cluster-facing subcommand and
//! is resolved through [`ClusterConfig::require_api_key`] before any network
//! call is made. The endpoint URL defaults to a local cluster when unset.

use crate::errors::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable carrying the cluster endpoint URL
pub const ENV_CLUSTER_URL: &str = "SKYSEARCH_CLUSTER_URL";
/// Environment variable carrying the cluster API key
pub const ENV_API_KEY: &str = "SKYSEARCH_API_KEY";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "SKYSEARCH_LOG";

/// Config file key that mirrors [`ENV_API_KEY`]; named in the fatal error
/// raised when the credential is missing from both sources
pub const KEY_API_KEY: &str = "cluster.api_key";

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote search cluster connection
    pub cluster: ClusterConfig,
    /// Bulk ingestion settings
    pub ingest: IngestConfig,
    /// Embedded corpus index settings
    pub corpus: CorpusConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Remote search cluster connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster endpoint URL
    pub url: String,
    /// API key; mandatory for cluster subcommands
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Bulk ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Documents accumulated before a batch is flushed
    pub batch_size: usize,
    /// Maximum failed items reported per batch
    pub failure_preview: usize,
    /// Delete and recreate the target collection before the first batch so
    /// repeated runs produce identical end state
    pub recreate_collection: bool,
    /// Optional dotted path of a document field used as the item id
    pub id_field: Option<String>,
}

/// Embedded corpus index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory holding the corpus index
    pub index_dir: PathBuf,
    /// Indexing heap per writer in bytes
    pub writer_heap_bytes: usize,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            failure_preview: 10,
            recreate_collection: true,
            id_field: None,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./data/corpus_index"),
            writer_heap_bytes: 50_000_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("skysearch.toml")
    }

    /// Load configuration from a specific file, falling back to defaults
    /// when the file does not exist
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| SearchError::Config {
                message: format!("failed to read config file {:?}: {}", path, e),
            })?;
            toml::from_str(&content).map_err(|e| SearchError::Config {
                message: format!("failed to parse config file {:?}: {}", path, e),
            })?
        } else {
            tracing::debug!("configuration file not found: {:?}, using defaults", path);
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(ENV_CLUSTER_URL) {
            self.cluster.url = url;
        }
        if let Some(api_key) = non_empty_env(ENV_API_KEY) {
            self.cluster.api_key = Some(api_key);
        }
        if let Some(level) = non_empty_env(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            return Err(SearchError::Config {
                message: "ingest.batch_size must be greater than zero".to_string(),
            });
        }
        if self.cluster.timeout_seconds == 0 {
            return Err(SearchError::Config {
                message: "cluster.timeout_seconds must be greater than zero".to_string(),
            });
        }
        if self.cluster.url.trim().is_empty() {
            return Err(SearchError::Config {
                message: "cluster.url must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl ClusterConfig {
    /// Resolve the mandatory API key, failing before any network call when
    /// it is absent from both the environment and the config file
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key.trim()),
            _ => Err(SearchError::MissingCredential {
                env_var: ENV_API_KEY,
                config_key: KEY_API_KEY,
            }),
        }
    }

    /// Endpoint URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cluster.url, "http://localhost:9200");
        assert_eq!(config.ingest.batch_size, 1000);
        assert_eq!(config.ingest.failure_preview, 10);
        assert!(config.ingest.recreate_collection);
    }

    #[test]
    fn test_require_api_key_missing() {
        let cluster = ClusterConfig::default();
        let err = cluster.require_api_key().unwrap_err();
        let message = err.to_string();
        assert!(message.contains(ENV_API_KEY));
        assert!(message.contains(KEY_API_KEY));
    }

    #[test]
    fn test_require_api_key_blank_is_missing() {
        let cluster = ClusterConfig {
            api_key: Some("   ".to_string()),
            ..ClusterConfig::default()
        };
        assert!(cluster.require_api_key().is_err());
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let cluster = ClusterConfig {
            url: "http://search.internal:9200/".to_string(),
            ..ClusterConfig::default()
        };
        assert_eq!(cluster.base_url(), "http://search.internal:9200");
    }

    #[test]
    fn test_partial_file_parses_with_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [cluster]
            url = "http://cluster:9200"

            [ingest]
            batch_size = 250
            "#,
        )
        .unwrap();
        assert_eq!(parsed.cluster.url, "http://cluster:9200");
        assert_eq!(parsed.ingest.batch_size, 250);
        assert_eq!(parsed.ingest.failure_preview, 10);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.ingest.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
