//! Chain module - RPC endpoint pools, token reads and contract bindings
//!
//! This module provides:
//! - Per-network endpoint pools with sticky failover
//! - Rate-limited ERC20 balance aggregation
//! - Bindings for the wrapped-token and OFT contracts

pub mod balances;
pub mod contracts;
pub mod provider;

pub use balances::{BalanceRecord, BalanceSource, ChainBalances, NativeFunds};
pub use contracts::{MessagingFee, OftClient, OftEndpoint};
pub use provider::{Connector, EndpointPool, HttpConnector};

use crate::config::Settings;
use crate::error::{BridgeError, BridgeResult};

use std::collections::HashMap;
use tracing::debug;

/// Owns one endpoint pool per configured network
pub struct ChainManager<C: Connector + Clone = HttpConnector> {
    pools: HashMap<String, EndpointPool<C>>,
}

impl<C: Connector + Clone> ChainManager<C> {
    /// Create a pool for every configured network
    pub fn new(settings: &Settings, connector: C) -> Self {
        let pools = settings
            .networks
            .iter()
            .map(|(name, network)| {
                debug!("Registering {} RPC endpoints for {}", network.rpc_urls.len(), name);
                let pool = EndpointPool::new(name.clone(), network.rpc_urls.clone(), connector.clone());
                (name.clone(), pool)
            })
            .collect();

        Self { pools }
    }

    /// Get the endpoint pool for a network
    pub fn pool(&self, network: &str) -> BridgeResult<&EndpointPool<C>> {
        self.pools
            .get(network)
            .ok_or_else(|| BridgeError::NetworkNotFound(network.to_string()))
    }

    /// Acquire a verified connection to `network`
    pub async fn acquire(&self, network: &str) -> BridgeResult<C::Connection> {
        self.pool(network)?.acquire().await
    }
}
