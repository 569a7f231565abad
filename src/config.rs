//! Host configuration loading from TOML.
//!
//! Covers the knobs of the *process*, not the user-facing settings
//! (those live in storage and are editable at runtime). Secrets are
//! referenced by env-var name and resolved via `std::env::var`, so the
//! config file itself never carries a key.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level host configuration. Every field has a default, so a
/// missing or partial `config.toml` is fine.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HostConfig {
    /// Path of the JSON state file backing the store.
    pub state_path: String,
    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
    pub keys: KeysConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
}

/// Env-var names the API keys are resolved from.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KeysConfig {
    pub finnhub_key_env: String,
    pub fred_key_env: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            state_path: crate::storage::DEFAULT_STATE_FILE.to_string(),
            request_timeout_ms: crate::net::DEFAULT_TIMEOUT_MS,
            retry: RetryConfig::default(),
            keys: KeysConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            finnhub_key_env: "FINNHUB_API_KEY".to_string(),
            fred_key_env: "FRED_API_KEY".to_string(),
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: HostConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value, empty when
    /// unset. API keys are optional; the adapters report a missing key
    /// per domain instead of the process refusing to start.
    pub fn resolve_env(env_name: &str) -> String {
        std::env::var(env_name).unwrap_or_default()
    }
}
