//! Configuration data model.
//!
//! `FileConfig` mirrors the TOML layout; `Config` is the resolved runtime
//! view handed to the connector builder.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{
    DEFAULT_API_BASE_URL, DEFAULT_MAXIMUM_RETRIES, DEFAULT_RETRY_ENABLED,
    DEFAULT_RETRY_INTERVAL_MS, DEFAULT_RETRY_MAXIMUM_MS, DEFAULT_RETRY_MINIMUM_MS,
    DEFAULT_RETRY_RATE, DEFAULT_TIMEOUT_SECS,
};
use crate::connector::{ConnectorConfiguration, DeviceMetadata};
use crate::error::ConfigError;
use crate::retry::{DelayFunction, RetryStrategy};

/// Top-level runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub connector: ConnectorConfiguration,
    pub network: NetworkConfig,
    pub retry: RetryConfig,
    pub device: DeviceMetadata,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connector: ConnectorConfiguration::new(DEFAULT_API_BASE_URL, ""),
            network: NetworkConfig::default(),
            retry: RetryConfig::default(),
            device: DeviceMetadata::default(),
        }
    }
}

/// Transport-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub maximum_retries: u32,
    /// Base delay of the exponential schedule.
    pub interval_ms: u64,
    pub rate: f64,
    pub minimum_ms: u64,
    pub maximum_ms: u64,
    /// Also retry 5xx server failures.
    pub retry_server_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_RETRY_ENABLED,
            maximum_retries: DEFAULT_MAXIMUM_RETRIES,
            interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            rate: DEFAULT_RETRY_RATE,
            minimum_ms: DEFAULT_RETRY_MINIMUM_MS,
            maximum_ms: DEFAULT_RETRY_MAXIMUM_MS,
            retry_server_errors: false,
        }
    }
}

impl RetryConfig {
    /// Build the exponential backoff schedule described by this section.
    pub fn strategy(&self) -> Result<RetryStrategy, ConfigError> {
        RetryStrategy::new(
            DelayFunction::Exponential {
                interval: Duration::from_millis(self.interval_ms),
                rate: self.rate,
            },
            self.maximum_retries,
            Duration::from_millis(self.minimum_ms),
            Duration::from_millis(self.maximum_ms),
        )
    }
}

/// Parsed TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct FileConfig {
    pub(super) api: ApiSection,
    pub(super) retry: RetryConfig,
    pub(super) device: DeviceSection,
}

/// `[api]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(super) struct ApiSection {
    pub(super) base_url: String,
    pub(super) project_id: String,
    pub(super) private_key: Option<String>,
    /// Name of an environment variable holding the private key.
    pub(super) private_key_env: Option<String>,
    pub(super) session_id: Option<String>,
    pub(super) locale: Option<String>,
    pub(super) timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            project_id: String::new(),
            private_key: None,
            private_key_env: None,
            session_id: None,
            locale: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// `[device]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct DeviceSection {
    pub(super) id: Option<String>,
    pub(super) installation_id: Option<String>,
    pub(super) system_version: Option<String>,
}
