//! Configuration Module
//!
//! This module defines all configuration structures for the transfer client.
//! Configuration is loaded from TOML files and parsed using serde.

use anyhow::Context;
use ethers::types::Address;
use serde::Deserialize;
use std::fs;

/// Main configuration structure
///
/// Contains all configuration sections for the transfer client.
/// Loaded from a TOML file (e.g., config/default.toml).
///
/// # Example TOML
/// ```toml
/// [api]
/// host = "127.0.0.1"
/// port = 8645
///
/// [relayer]
/// base_url = "https://api.loopring.io"
/// poll_interval_ms = 15000
///
/// [validator]
/// debounce_ms = 500
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub relayer: RelayerConfig,
    pub l1: L1Config,
    pub exchange: ExchangeConfig,
    pub account: AccountConfig,
    pub signer: SignerConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
}

/// JSON-RPC endpoint the presentation layer talks to
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Relayer REST API settings
///
/// # Fields
/// - `base_url`: Relayer endpoint (e.g., "https://api.loopring.io")
/// - `timeout_ms`: Per-request timeout
/// - `poll_interval_ms`: How often balances, fees and tokens are refreshed
#[derive(Debug, Clone, Deserialize)]
pub struct RelayerConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Layer 1 connection used for name-service resolution
#[derive(Debug, Clone, Deserialize)]
pub struct L1Config {
    pub rpc_url: String,
}

/// Exchange constants stamped into every transfer request
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub exchange_id: u32,
    #[serde(default)]
    pub label: u32,
}

/// The sending account
///
/// The API key is sent as `X-API-KEY` on submission and never logged.
#[derive(Clone, Deserialize)]
pub struct AccountConfig {
    pub address: Address,
    pub account_id: u64,
    pub api_key: String,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("address", &self.address)
            .field("account_id", &self.account_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Where the signing key comes from
///
/// The key itself never lives in the config file; `private_key_env` names
/// the environment variable that holds it.
#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    pub private_key_env: String,
}

/// Transfer validator tuning
///
/// # Fields
/// - `debounce_ms`: Quiet window before a recipient input is resolved
/// - `memo_max_len`: Longest memo accepted, in characters
/// - `name_suffixes`: Suffixes that mark an input as a name-service name
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_memo_max_len")]
    pub memo_max_len: usize,
    #[serde(default = "default_name_suffixes")]
    pub name_suffixes: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            memo_max_len: default_memo_max_len(),
            name_suffixes: default_name_suffixes(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    15_000
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_memo_max_len() -> usize {
    128
}

fn default_name_suffixes() -> Vec<String> {
    vec!["eth".to_string(), "xyz".to_string()]
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("invalid config TOML")?;
        Ok(config)
    }

    /// Read the signing key from the environment variable named in `[signer]`
    pub fn signer_key(&self) -> anyhow::Result<String> {
        std::env::var(&self.signer.private_key_env).with_context(|| {
            format!(
                "signing key variable {} is not set",
                self.signer.private_key_env
            )
        })
    }
}
