use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use oracle_crypto::MAX_CHAIN_ID;
use oracle_types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeSettings;
use crate::submitter::SubmitterSettings;

/// Environment variable holding the oracle's hex private key.
pub const PRIVATE_KEY_ENV: &str = "ORACLE_PRIVATE_KEY";

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger connection
    pub ledger: LedgerConfig,
    /// Oracle contract addresses
    pub contract: ContractConfig,
    /// Polling loop
    pub bridge: LoopConfig,
    /// Fulfillment transactions
    pub submitter: SubmitterConfig,
    /// Inference model and cache
    pub model: ModelConfig,
    /// Request payload decoding
    pub decoder: DecoderConfig,
    /// Logging
    pub log: LogConfig,
    /// Metrics endpoint
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Expected chain ID, checked against `eth_chainId` at startup
    pub chain_id: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Contract receiving `fulfillPrediction`
    pub oracle_address: Address,
    /// Contract emitting `PredictionRequested`; defaults to the oracle
    pub request_address: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub poll_interval_secs: u64,
    pub error_cooldown_secs: u64,
    pub rate_limit_cooldown_secs: u64,
    /// First block to process, at least 1; the current head when unset
    pub start_block: Option<u64>,
    /// Maximum blocks per tick, 0 for unlimited
    pub max_block_range: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitterConfig {
    pub gas_multiplier: f64,
    pub gas_limit_ceiling: u64,
    /// Fixed gas price in wei; `eth_gasPrice` when unset
    pub gas_price: Option<u64>,
    pub receipt_poll_interval_ms: u64,
    /// 0 waits indefinitely
    pub receipt_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub cache_capacity: usize,
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Treat non-JSON payloads as one feature per byte
    pub allow_raw_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 1337,
            request_timeout_secs: 30,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            error_cooldown_secs: 5,
            rate_limit_cooldown_secs: 60,
            start_block: None,
            max_block_range: 0,
        }
    }
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            gas_multiplier: 1.2,
            gas_limit_ceiling: 300_000,
            gas_price: None,
            receipt_poll_interval_ms: 1000,
            receipt_timeout_secs: 0,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/demo_model.json"),
            cache_capacity: 10_000,
            history_capacity: 1_000,
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            allow_raw_fallback: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:9100".to_string(),
        }
    }
}

impl ContractConfig {
    pub fn request_address(&self) -> Address {
        self.request_address.unwrap_or(self.oracle_address)
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl MetricsConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("Invalid metrics listen address '{}'", self.listen))
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ledger.rpc_url.trim().is_empty() {
            anyhow::bail!("ledger.rpc_url must be set");
        }
        if self.ledger.chain_id == 0 || self.ledger.chain_id > MAX_CHAIN_ID {
            anyhow::bail!("ledger.chain_id must be between 1 and {}", MAX_CHAIN_ID);
        }
        if self.ledger.request_timeout_secs == 0 {
            anyhow::bail!("ledger.request_timeout_secs must be greater than 0");
        }

        if self.contract.oracle_address.is_zero() {
            anyhow::bail!("contract.oracle_address must be a non-zero address");
        }
        if self.contract.request_address.is_some_and(|a| a.is_zero()) {
            anyhow::bail!("contract.request_address must be a non-zero address");
        }

        if self.bridge.poll_interval_secs == 0 {
            anyhow::bail!("bridge.poll_interval_secs must be greater than 0");
        }
        if self.bridge.start_block == Some(0) {
            anyhow::bail!("bridge.start_block must be at least 1; the genesis block carries no requests");
        }

        if !self.submitter.gas_multiplier.is_finite() || self.submitter.gas_multiplier < 1.0 {
            anyhow::bail!("submitter.gas_multiplier must be at least 1.0");
        }
        if self.submitter.gas_limit_ceiling == 0 {
            anyhow::bail!("submitter.gas_limit_ceiling must be greater than 0");
        }
        if self.submitter.receipt_poll_interval_ms == 0 {
            anyhow::bail!("submitter.receipt_poll_interval_ms must be greater than 0");
        }

        if self.model.cache_capacity == 0 || self.model.history_capacity == 0 {
            anyhow::bail!("model cache and history capacities must be greater than 0");
        }

        if self.metrics.enabled {
            self.metrics.listen_addr()?;
        }

        Ok(())
    }

    pub fn loop_settings(&self) -> BridgeSettings {
        BridgeSettings {
            poll_interval: Duration::from_secs(self.bridge.poll_interval_secs),
            error_cooldown: Duration::from_secs(self.bridge.error_cooldown_secs),
            rate_limit_cooldown: Duration::from_secs(self.bridge.rate_limit_cooldown_secs),
            max_block_range: (self.bridge.max_block_range > 0).then_some(self.bridge.max_block_range),
        }
    }

    pub fn submitter_settings(&self) -> SubmitterSettings {
        SubmitterSettings {
            chain_id: self.ledger.chain_id,
            gas_multiplier: self.submitter.gas_multiplier,
            gas_limit_ceiling: self.submitter.gas_limit_ceiling,
            gas_price: self.submitter.gas_price.map(U256::from),
            receipt_poll_interval: Duration::from_millis(self.submitter.receipt_poll_interval_ms),
            receipt_timeout: (self.submitter.receipt_timeout_secs > 0)
                .then(|| Duration::from_secs(self.submitter.receipt_timeout_secs)),
        }
    }
}
