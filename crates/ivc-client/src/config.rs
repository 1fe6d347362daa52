//! Client configuration.

use crate::error::{ClientError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for an `IndexClient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Quotes channel WebSocket URL.
    pub quotes_url: String,
    /// Orders channel WebSocket URL.
    pub orders_url: String,
    /// Our comp id in message headers. Default: "INDEX-CLIENT".
    #[serde(default = "default_sender_comp_id")]
    pub sender_comp_id: String,
    /// Counterparty comp id. Default: "INDEX-VAULT".
    #[serde(default = "default_target_comp_id")]
    pub target_comp_id: String,
    /// Chain id carried in message bodies. Default: 1.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Interval between background quote polls (ms). Default: 10,000.
    #[serde(default = "default_quote_poll_interval_ms")]
    pub quote_poll_interval_ms: u64,
    /// Deadline for `request_quote_and_wait` (ms). Default: 10,000.
    #[serde(default = "default_quote_timeout_ms")]
    pub quote_timeout_ms: u64,
    /// Notional amount used by the background price poll. Default: 1000.
    #[serde(default = "default_quote_probe_amount")]
    pub quote_probe_amount: Decimal,
}

fn default_sender_comp_id() -> String {
    "INDEX-CLIENT".to_string()
}

fn default_target_comp_id() -> String {
    "INDEX-VAULT".to_string()
}

fn default_chain_id() -> u64 {
    1
}

fn default_quote_poll_interval_ms() -> u64 {
    10_000
}

fn default_quote_timeout_ms() -> u64 {
    10_000
}

fn default_quote_probe_amount() -> Decimal {
    Decimal::new(1000, 0)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            quotes_url: String::new(),
            orders_url: String::new(),
            sender_comp_id: default_sender_comp_id(),
            target_comp_id: default_target_comp_id(),
            chain_id: default_chain_id(),
            quote_poll_interval_ms: default_quote_poll_interval_ms(),
            quote_timeout_ms: default_quote_timeout_ms(),
            quote_probe_amount: default_quote_probe_amount(),
        }
    }
}

impl ClientConfig {
    /// Load configuration, preferring the path in `IVC_CONFIG`.
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("IVC_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {e}")))
    }
}
