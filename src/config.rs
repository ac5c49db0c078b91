//! Configuration management for the Wrapped Alpha bridge
//!
//! Loads configuration from TOML files with environment variable substitution.
//! Networks, netuid deployments and LayerZero endpoint ids are static: they are
//! read once at startup and never mutated.

use crate::error::{BridgeError, BridgeResult};

use anyhow::{Context, Result};
use ethers::types::Address;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bridge: BridgeConfig,
    pub wallet: WalletConfig,
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default)]
    pub eids: BTreeMap<String, u32>,
    #[serde(default)]
    pub netuids: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_home_network")]
    pub home_network: String,
    #[serde(default = "default_inter_call_delay_ms")]
    pub inter_call_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    #[serde(default = "default_max_prompt_attempts")]
    pub max_prompt_attempts: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_low_balance_wei")]
    pub low_balance_wei: u64,
    pub status_api_url: String,
    pub scan_tx_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub key_file: Option<String>,
    pub key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub aliases: Vec<String>,
    pub rpc_urls: Vec<String>,
    pub explorer_tx_url: Option<String>,
}

fn default_home_network() -> String {
    "tao".to_string()
}

fn default_inter_call_delay_ms() -> u64 {
    350
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_poll_max_attempts() -> u32 {
    120
}

fn default_max_prompt_attempts() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_low_balance_wei() -> u64 {
    10_000_000_000_000_000
}

impl BridgeConfig {
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    /// Load settings from `path`, `WAB_CONFIG`, or the built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("WAB_CONFIG").ok().map(PathBuf::from));

        let config_str = match config_path {
            Some(ref path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?,
            None => DEFAULT_CONFIG.to_string(),
        };

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            anyhow::bail!("At least one network must be configured");
        }

        let mut seen_aliases: BTreeMap<String, &str> = BTreeMap::new();
        for (name, network) in &self.networks {
            if network.rpc_urls.is_empty() {
                anyhow::bail!("Network {} has no RPC URLs configured", name);
            }
            for alias in network.aliases.iter().chain(std::iter::once(name)) {
                let alias = alias.to_lowercase();
                if let Some(owner) = seen_aliases.insert(alias.clone(), name.as_str()) {
                    if owner != name.as_str() {
                        anyhow::bail!("Alias {} is used by both {} and {}", alias, owner, name);
                    }
                }
            }
        }

        if !self.networks.contains_key(&self.bridge.home_network) {
            anyhow::bail!("Home network {} is not configured", self.bridge.home_network);
        }

        for chain in self.eids.keys() {
            if !self.networks.contains_key(chain) {
                anyhow::bail!("Endpoint id configured for unknown network {}", chain);
            }
        }

        for (netuid, deployments) in &self.netuids {
            for (network, address) in deployments {
                if !self.networks.contains_key(network) {
                    anyhow::bail!("Netuid {} references unknown network {}", netuid, network);
                }
                Address::from_str(address).with_context(|| {
                    format!("Netuid {} has an invalid {} address: {}", netuid, network, address)
                })?;
            }
        }

        if self.bridge.poll_max_attempts == 0 {
            anyhow::bail!("poll_max_attempts must be at least 1");
        }
        if self.bridge.max_prompt_attempts == 0 {
            anyhow::bail!("max_prompt_attempts must be at least 1");
        }

        Ok(())
    }

    /// Resolve a network name or alias to its configured id
    pub fn resolve_network(&self, name: &str) -> BridgeResult<String> {
        let wanted = name.trim().to_lowercase();
        self.networks
            .iter()
            .find(|(id, network)| {
                id.to_lowercase() == wanted
                    || network.aliases.iter().any(|a| a.to_lowercase() == wanted)
            })
            .map(|(id, _)| id.clone())
            .ok_or_else(|| BridgeError::NetworkNotFound(name.to_string()))
    }

    /// All configured network ids, in stable order
    pub fn supported_chains(&self) -> Vec<String> {
        self.networks.keys().cloned().collect()
    }

    /// LayerZero endpoint id for a chain
    pub fn eid(&self, chain: &str) -> BridgeResult<u32> {
        self.eids
            .get(chain)
            .copied()
            .ok_or_else(|| BridgeError::ChainNotBridgeable(chain.to_string()))
    }

    pub fn is_bridgeable(&self, chain: &str) -> bool {
        self.eids.contains_key(chain)
    }

    /// Networks that also have a LayerZero endpoint id
    pub fn bridgeable_chains(&self) -> Vec<String> {
        self.networks
            .keys()
            .filter(|id| self.is_bridgeable(id))
            .cloned()
            .collect()
    }

    /// Configured netuids, numerically ordered where possible
    pub fn netuids(&self) -> Vec<String> {
        let mut netuids: Vec<String> = self.netuids.keys().cloned().collect();
        netuids.sort_by_key(|n| (n.parse::<u64>().unwrap_or(u64::MAX), n.clone()));
        netuids
    }

    /// Contract address of a netuid's wrapped token on a network
    pub fn contract(&self, netuid: &str, network: &str) -> BridgeResult<Address> {
        let address = self
            .netuids
            .get(netuid)
            .and_then(|deployments| deployments.get(network))
            .ok_or_else(|| BridgeError::AssetNotFound {
                netuid: netuid.to_string(),
                network: network.to_string(),
            })?;

        Address::from_str(address)
            .map_err(|e| BridgeError::Config(format!("Invalid contract address {}: {}", address, e)))
    }

    /// Every netuid deployed on `network`, with its contract address
    pub fn netuid_contracts(&self, network: &str) -> Vec<(String, Address)> {
        self.netuids()
            .into_iter()
            .filter_map(|netuid| {
                let address = self.contract(&netuid, network).ok()?;
                Some((netuid, address))
            })
            .collect()
    }

    /// Block explorer link for a transaction on `network`
    pub fn explorer_url(&self, network: &str, tx_hash: &str) -> Option<String> {
        self.networks
            .get(network)
            .and_then(|n| n.explorer_tx_url.as_ref())
            .map(|url| url.replace("{hash}", tx_hash))
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
