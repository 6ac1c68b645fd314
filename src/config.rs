//! Configuration management for the HYBRID ledger node

use crate::blockchain::{
    AssemblerConfig, DEFAULT_BLOCK_GAS_LIMIT, DEFAULT_LOCAL_VALIDATOR, DEFAULT_MAX_BLOCK_TRANSACTIONS,
};
use crate::consensus::{
    Description, ProposerSelection, Rate, RegistryConfig, ValidatorRegistration,
    DEFAULT_MAX_VALIDATORS, DEFAULT_MISSED_BLOCK_THRESHOLD, DEFAULT_UPTIME_WINDOW,
};
use crate::crypto::parse_address;
use crate::error::ChainError;
use crate::mempool::{DEFAULT_POOL_CAPACITY, DEFAULT_RECENT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub mempool: MempoolConfig,
    pub block: BlockConfig,
    pub validators: ValidatorsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Hex address or human-readable label
    pub validator_address: String,
    #[serde(with = "humantime_serde_str")]
    pub block_interval: Duration,
    #[serde(with = "humantime_serde_str")]
    pub expiry_sweep_interval: Duration,
    pub api_port: u16,
    /// Optional JSON-lines journal of committed blocks
    pub journal_path: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            validator_address: DEFAULT_LOCAL_VALIDATOR.to_string(),
            block_interval: Duration::from_secs(6),
            expiry_sweep_interval: Duration::from_secs(60),
            api_port: 3000,
            journal_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    pub capacity: usize,
    pub recent_capacity: usize,
    #[serde(with = "humantime_serde_str")]
    pub max_tx_age: Duration,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            max_tx_age: Duration::from_secs(24 * 3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub max_transactions: usize,
    pub gas_limit: u64,
    pub require_proposer_turn: bool,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            max_transactions: DEFAULT_MAX_BLOCK_TRANSACTIONS,
            gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            require_proposer_turn: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposerSelectionMode {
    #[default]
    RoundRobin,
    StakeWeighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorsConfig {
    pub max_validators: usize,
    pub missed_block_threshold: u64,
    #[serde(with = "humantime_serde_str")]
    pub downtime_jail: Duration,
    #[serde(with = "humantime_serde_str")]
    pub default_jail: Duration,
    pub uptime_window: usize,
    #[serde(with = "humantime_serde_str")]
    pub unbonding_period: Duration,
    pub proposer_selection: ProposerSelectionMode,
    pub proposer_seed: u64,
    pub genesis: Vec<GenesisValidator>,
}

impl Default for ValidatorsConfig {
    fn default() -> Self {
        Self {
            max_validators: DEFAULT_MAX_VALIDATORS,
            missed_block_threshold: DEFAULT_MISSED_BLOCK_THRESHOLD,
            downtime_jail: Duration::from_secs(3600),
            default_jail: Duration::from_secs(600),
            uptime_window: DEFAULT_UPTIME_WINDOW,
            unbonding_period: Duration::from_secs(21 * 24 * 3600),
            proposer_selection: ProposerSelectionMode::RoundRobin,
            proposer_seed: 0,
            genesis: Vec::new(),
        }
    }
}

/// A validator registered and self-bonded at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub address: String,
    #[serde(default)]
    pub moniker: String,
    /// Hex-encoded public key
    #[serde(default)]
    pub pub_key: String,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
    #[serde(default = "default_min_self_delegation")]
    pub min_self_delegation: u64,
    #[serde(default = "default_min_self_delegation")]
    pub self_delegation: u64,
    #[serde(default)]
    pub license: Option<String>,
}

fn default_commission_rate() -> f64 {
    0.1
}

fn default_min_self_delegation() -> u64 {
    1_000_000
}

impl GenesisValidator {
    pub fn registration(&self) -> Result<ValidatorRegistration, ChainError> {
        let address = parse_address(&self.address)?;
        let pub_key = hex::decode(&self.pub_key).map_err(|e| {
            ChainError::ConfigError(format!("Invalid pub_key for {}: {}", self.address, e))
        })?;
        let rate = Rate::checked_from_num(self.commission_rate).ok_or_else(|| {
            ChainError::ConfigError(format!("Invalid commission_rate for {}", self.address))
        })?;

        let moniker = if self.moniker.is_empty() {
            self.address.clone()
        } else {
            self.moniker.clone()
        };
        let mut registration = ValidatorRegistration::new(address, pub_key, rate, self.min_self_delegation)
            .with_description(Description {
                moniker,
                ..Description::default()
            });
        if let Some(license) = &self.license {
            registration = registration.with_license(license.clone());
        }
        Ok(registration)
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(s)
            .map_err(|e| ChainError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.node.validator_address.trim().is_empty() {
            return Err(ChainError::ConfigError(
                "node.validator_address must be set".to_string(),
            ));
        }
        if self.node.block_interval.is_zero() {
            return Err(ChainError::ConfigError(
                "node.block_interval must be positive".to_string(),
            ));
        }
        if self.node.expiry_sweep_interval.is_zero() {
            return Err(ChainError::ConfigError(
                "node.expiry_sweep_interval must be positive".to_string(),
            ));
        }
        if self.mempool.capacity == 0 {
            return Err(ChainError::ConfigError(
                "mempool.capacity must be positive".to_string(),
            ));
        }
        if self.block.gas_limit == 0 {
            return Err(ChainError::ConfigError(
                "block.gas_limit must be positive".to_string(),
            ));
        }
        if self.validators.max_validators == 0 {
            return Err(ChainError::ConfigError(
                "validators.max_validators must be positive".to_string(),
            ));
        }
        parse_address(&self.node.validator_address)?;
        for genesis in &self.validators.genesis {
            genesis.registration()?;
        }
        Ok(())
    }

    pub fn assembler_config(&self) -> Result<AssemblerConfig, ChainError> {
        Ok(AssemblerConfig {
            max_transactions: self.block.max_transactions,
            block_gas_limit: self.block.gas_limit,
            local_validator: parse_address(&self.node.validator_address)?,
            require_proposer_turn: self.block.require_proposer_turn,
        })
    }

    pub fn registry_config(&self) -> RegistryConfig {
        let v = &self.validators;
        let proposer_selection = match v.proposer_selection {
            ProposerSelectionMode::RoundRobin => ProposerSelection::RoundRobin,
            ProposerSelectionMode::StakeWeighted => ProposerSelection::StakeWeighted {
                seed: v.proposer_seed,
            },
        };
        RegistryConfig {
            max_validators: v.max_validators,
            missed_block_threshold: v.missed_block_threshold,
            downtime_jail: v.downtime_jail,
            default_jail: v.default_jail,
            uptime_window: v.uptime_window,
            unbonding_period: v.unbonding_period,
            proposer_selection,
        }
    }
}

/// Loads `config.toml` from the working directory, falling back to defaults.
pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads a config file; a missing file yields the defaults.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(contents) => Config::from_toml_str(&contents),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(ChainError::ConfigError(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Durations as humantime strings ("6s", "24h").
mod humantime_serde_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
