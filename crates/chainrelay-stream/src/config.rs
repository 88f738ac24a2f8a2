//! Relay configuration, loaded from YAML.
//!
//! ```yaml
//! chains:
//!   - { slug: polygon-amoy, chain_id: 80002, ws_url_env: INFURA_WEBSOCKET_URL }
//! contracts:
//!   - name: Token
//!     abi: contracts/token.abi.json
//!     addresses: contracts/token.addresses.json
//! sink:
//!   base_url: http://localhost:8080
//!   endpoints: { Mint: /api/events/mint, Burn: /api/events/burn }
//! ```
//!
//! Relative file paths resolve against the directory of the config file.

use chainrelay_evm::CallerConfig;
use chainrelay_forward::{resolve_endpoints, SinkConfig};
use chainrelay_observability::LogConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("environment variable {var} is not set (needed by chain {chain})")]
    MissingEnv { var: String, chain: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One chain to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub slug: String,
    pub chain_id: u64,
    /// Inline WebSocket endpoint
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Environment variable holding the endpoint (keeps API keys out of the file)
    #[serde(default)]
    pub ws_url_env: Option<String>,
}

impl ChainConfig {
    /// The endpoint, from `ws_url` or the `ws_url_env` variable.
    pub fn resolve_ws_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.ws_url {
            return Ok(url.clone());
        }
        let var = self.ws_url_env.as_deref().ok_or_else(|| {
            ConfigError::Invalid(format!("chain {} has neither ws_url nor ws_url_env", self.slug))
        })?;
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv {
                var: var.to_string(),
                chain: self.slug.clone(),
            })
    }
}

/// One contract type: ABI, deployments and per-event behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub name: String,
    /// ABI JSON file (array or artifact form)
    pub abi: PathBuf,
    /// Address book file `{ "<chain id>": "0x..." }`
    pub addresses: PathBuf,
    /// Server-side `topics[0]` filter by event name; empty = every event
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub caller: CallerConfig,
}

fn default_max_attempts() -> u32 { 5 }
fn default_initial_delay_ms() -> u64 { 5_000 }
fn default_multiplier() -> f64 { 1.0 }
fn default_max_delay_ms() -> u64 { 60_000 }

/// Reconnect policy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive failures tolerated before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// ±fraction of the delay, 0.0..=1.0
    #[serde(default)]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: 0.0,
        }
    }
}

fn default_max_in_flight() -> usize { 64 }
fn default_timeout_ms() -> u64 { 15_000 }
fn default_metrics_interval_secs() -> u64 { 60 }

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on concurrently processed logs, relay-wide
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub subscribe_timeout_ms: u64,
    /// Fetch the emitting transaction for each log and log it at debug level
    #[serde(default)]
    pub enrich_transactions: bool,
    /// 0 disables periodic metrics logging
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            connect_timeout_ms: default_timeout_ms(),
            subscribe_timeout_ms: default_timeout_ms(),
            enrich_transactions: false,
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_timeout_ms)
    }
}

fn default_monitor_interval_secs() -> u64 { 60 }
fn default_monitor_retry_secs() -> u64 { 5 }
fn default_monitor_functions() -> Vec<String> {
    ["name", "symbol", "totalSupply"].map(String::from).to_vec()
}

/// Periodic contract state reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_monitor_interval_secs")]
    pub interval_secs: u64,
    /// Wait before retrying after a failed connection
    #[serde(default = "default_monitor_retry_secs")]
    pub retry_delay_secs: u64,
    /// Zero-argument view functions to read; names the ABI lacks are skipped
    #[serde(default = "default_monitor_functions")]
    pub functions: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_monitor_interval_secs(),
            retry_delay_secs: default_monitor_retry_secs(),
            functions: default_monitor_functions(),
        }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub log: LogConfig,
    pub chains: Vec<ChainConfig>,
    pub contracts: Vec<ContractConfig>,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Directory relative paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl RelayConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_yaml(&text)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Parse and validate YAML text. Relative paths resolve against the
    /// current directory.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Structural checks; everything that can be caught before connecting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.chains.is_empty() {
            return invalid("at least one chain is required".into());
        }
        if self.contracts.is_empty() {
            return invalid("at least one contract is required".into());
        }

        let mut slugs = HashSet::new();
        let mut ids = HashSet::new();
        for chain in &self.chains {
            if !slugs.insert(chain.slug.as_str()) {
                return invalid(format!("duplicate chain slug '{}'", chain.slug));
            }
            if !ids.insert(chain.chain_id) {
                return invalid(format!("duplicate chain id {}", chain.chain_id));
            }
            if chain.ws_url.is_none() && chain.ws_url_env.is_none() {
                return invalid(format!("chain {} has neither ws_url nor ws_url_env", chain.slug));
            }
        }

        let mut names = HashSet::new();
        for contract in &self.contracts {
            if !names.insert(contract.name.as_str()) {
                return invalid(format!("duplicate contract '{}'", contract.name));
            }
        }

        let r = &self.retry;
        if r.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }
        if !(r.multiplier.is_finite() && r.multiplier >= 1.0) {
            return invalid(format!("retry.multiplier must be >= 1.0, got {}", r.multiplier));
        }
        if !(0.0..=1.0).contains(&r.jitter) {
            return invalid(format!("retry.jitter must be within 0.0..=1.0, got {}", r.jitter));
        }
        if r.max_delay_ms < r.initial_delay_ms {
            return invalid("retry.max_delay_ms must be >= retry.initial_delay_ms".into());
        }

        if self.pipeline.max_in_flight == 0 {
            return invalid("pipeline.max_in_flight must be at least 1".into());
        }
        if self.monitor.enabled && self.monitor.interval_secs == 0 {
            return invalid("monitor.interval_secs must be at least 1".into());
        }

        resolve_endpoints(&self.sink).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
