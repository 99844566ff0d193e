//! Client configuration.
//!
//! Values come from the environment with sensible defaults:
//!
//! | Variable                    | Default                 |
//! |-----------------------------|-------------------------|
//! | `INCIDENT_API_URL`          | `http://127.0.0.1:5000` |
//! | `INCIDENT_API_TIMEOUT_SECS` | `30`                    |
//! | `INCIDENT_API_MAX_RETRIES`  | `3`                     |

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use log::info;

use crate::error::{IncidentError, Result};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const ENV_BASE_URL: &str = "INCIDENT_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "INCIDENT_API_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "INCIDENT_API_MAX_RETRIES";

/// Connection settings for the reporting backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Scheme + host (+ optional prefix) the `/api/...` paths hang off
    pub base_url: String,
    /// Per-request timeout. A hung request fails instead of pending forever.
    pub timeout: Duration,
    /// Retries for idempotent GET requests. Commands are never retried.
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            base_url: try_load(&lookup, ENV_BASE_URL, DEFAULT_BASE_URL.to_string())?,
            timeout: Duration::from_secs(try_load(&lookup, ENV_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS)?),
            max_retries: try_load(&lookup, ENV_MAX_RETRIES, DEFAULT_MAX_RETRIES)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(IncidentError::config(format!(
                "base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(IncidentError::config("timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Absolute URL for an `/api/...` path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim().trim_end_matches('/'), path)
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| IncidentError::config(format!("invalid {} value '{}': {}", key, raw, e))),
    }
}
