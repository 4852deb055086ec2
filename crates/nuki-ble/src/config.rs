//! Client configuration
//!
//! Durations are (de)serialized in humantime form, e.g. `"10s"` or `"1m 30s"`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{NukiError, Result};
use nuki_protocol::requests::NAME_SUFFIX_LEN;

/// Default time to wait for each response
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;

/// Default label attached to the client's tracing span
pub const DEFAULT_LABEL: &str = "nuki";

/// Configuration for a [`Client`](crate::Client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Deadline for each response wait
    #[serde(with = "humantime_serde", default = "default_response_timeout")]
    pub response_timeout: Duration,

    /// Label recorded on every log line of this client
    #[serde(default = "default_label")]
    pub label: String,

    /// App id sent with lock and open actions
    #[serde(default)]
    pub app_id: u32,

    /// Name suffix sent with lock and open actions (at most 20 bytes)
    #[serde(default)]
    pub name_suffix: Option<String>,

    /// Check the device authenticator during pairing
    #[serde(default = "default_verify")]
    pub verify_device_authenticator: bool,
}

fn default_response_timeout() -> Duration {
    Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS)
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

fn default_verify() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: default_response_timeout(),
            label: default_label(),
            app_id: 0,
            name_suffix: None,
            verify_device_authenticator: default_verify(),
        }
    }
}

impl ClientConfig {
    /// Reject values the device cannot accept
    pub fn validate(&self) -> Result<()> {
        if self.response_timeout.is_zero() {
            return Err(NukiError::InvalidConfig(
                "response_timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(suffix) = &self.name_suffix {
            if suffix.len() > NAME_SUFFIX_LEN {
                return Err(NukiError::InvalidConfig(format!(
                    "name_suffix is {} bytes, at most {} allowed",
                    suffix.len(),
                    NAME_SUFFIX_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response timeout
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Set the tracing label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Set the app id sent with actions
    pub fn app_id(mut self, app_id: u32) -> Self {
        self.config.app_id = app_id;
        self
    }

    /// Set the name suffix sent with actions
    pub fn name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.name_suffix = Some(suffix.into());
        self
    }

    /// Enable or disable device authenticator verification
    pub fn verify_device_authenticator(mut self, verify: bool) -> Self {
        self.config.verify_device_authenticator = verify;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// Custom serde module for Duration with humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
