//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::credentials::CREDENTIALS_FILENAME;
use crate::error::ConfigError;

/// Configuration for the dispatch client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the dispatch server (`http(s)://` or `ws(s)://`)
    pub server_url: String,

    /// Upper bound on the connect handshake
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Where the credentials file lives
    pub credentials_path: PathBuf,

    /// Capacity of the inbound event queue between transport and manager
    pub event_buffer: usize,

    /// Backoff for caller-driven reconnect attempts
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            connect_timeout: Duration::from_secs(20),
            credentials_path: super::default_config_dir().join(CREDENTIALS_FILENAME),
            event_buffer: 256,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Reject values the client cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::MissingField("server_url".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter) {
            return Err(ConfigError::Invalid(
                "backoff.jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "backoff.multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}
