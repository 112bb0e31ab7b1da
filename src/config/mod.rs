//! Configuration module for Chunked Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Every section has defaults,
//! so an empty document is a valid configuration.
//!
//! # Example
//!
//! ```yaml
//! server:
//!   base_url: "${UPLOAD_BASE_URL:-http://localhost:8080/upload}"
//!   timeout_seconds: 30
//! upload:
//!   chunk_size: 5242880
//!   batch_size: 5
//!   identity: name
//! logging:
//!   level: info
//!   format: pretty
//! metrics:
//!   enabled: false
//! ```

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::client::HttpTransportConfig;
use crate::identity::IdentityKind;
use crate::upload::{UploadOptions, DEFAULT_BATCH_SIZE};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

lazy_static! {
    // ${VAR} or ${VAR:-default}
    static ref ENV_VAR_PATTERN: regex_lite::Regex =
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
}

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with an uppercase letter or underscore and
/// contain only uppercase letters, digits, and underscores.
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = &*ENV_VAR_PATTERN;
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.server.base_url) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid base_url '{}': must start with http:// or https://",
                self.server.base_url
            )));
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.upload.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunk_size must be greater than zero".into(),
            ));
        }

        if self.upload.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch_size must be greater than zero".into(),
            ));
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid logging format '{}': must be 'pretty' or 'json'",
                    other
                )))
            }
        }

        Ok(())
    }
}

/// Upload server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL the status, check and complete endpoints live under
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ServerConfig {
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.base_url.clone(),
            timeout: Some(Duration::from_secs(self.timeout_seconds)),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/upload".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Chunking and concurrency configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub identity: IdentityKind,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            batch_size: default_batch_size(),
            identity: IdentityKind::default(),
        }
    }
}

impl UploadConfig {
    pub fn options(&self) -> UploadOptions {
        UploadOptions {
            chunk_size: self.chunk_size,
            batch_size: self.batch_size,
        }
    }
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Print Prometheus metrics to stderr after each run
    #[serde(default)]
    pub enabled: bool,
}
