//! ERC20 balance aggregation across many token contracts
//!
//! Public RPC endpoints throttle aggressively, so contracts are read one at a
//! time with a pause between them. The three reads for a single contract go
//! out together. A contract that cannot be read yields a placeholder record
//! instead of failing the whole batch.

use super::contracts::Erc20;
use super::ChainManager;
use crate::error::{BridgeError, BridgeResult};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Balance of one token for one owner, read fresh on every query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRecord {
    pub symbol: String,
    pub balance: U256,
    pub decimals: u8,
}

impl BalanceRecord {
    /// Placeholder for a contract that could not be read
    pub fn unknown() -> Self {
        Self {
            symbol: "Unknown".to_string(),
            balance: U256::zero(),
            decimals: 18,
        }
    }
}

/// How much native currency an account has for fees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFunds {
    Empty,
    Low,
    Sufficient,
}

impl NativeFunds {
    pub fn classify(balance: U256, low_threshold: U256) -> Self {
        if balance.is_zero() {
            NativeFunds::Empty
        } else if balance < low_threshold {
            NativeFunds::Low
        } else {
            NativeFunds::Sufficient
        }
    }

    /// What to tell the user, if anything
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            NativeFunds::Empty => {
                Some("Your balance is empty! Send TAO to your EVM address to load it with funds")
            }
            NativeFunds::Low => {
                Some("Your balance is low on funds, make sure you can pay the transaction fees")
            }
            NativeFunds::Sufficient => None,
        }
    }
}

/// Read-only ERC20 calls
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenReader: Send + Sync {
    async fn balance_of(&self, token: Address, owner: Address) -> BridgeResult<U256>;
    async fn decimals(&self, token: Address) -> BridgeResult<u8>;
    async fn symbol(&self, token: Address) -> BridgeResult<String>;
}

fn contract_error(token: Address, call: &str, e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Contract(format!("{} on {:?} failed: {}", call, token, e))
}

#[async_trait]
impl TokenReader for Provider<Http> {
    async fn balance_of(&self, token: Address, owner: Address) -> BridgeResult<U256> {
        Erc20::new(token, Arc::new(self.clone()))
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| contract_error(token, "balanceOf", e))
    }

    async fn decimals(&self, token: Address) -> BridgeResult<u8> {
        Erc20::new(token, Arc::new(self.clone()))
            .decimals()
            .call()
            .await
            .map_err(|e| contract_error(token, "decimals", e))
    }

    async fn symbol(&self, token: Address) -> BridgeResult<String> {
        Erc20::new(token, Arc::new(self.clone()))
            .symbol()
            .call()
            .await
            .map_err(|e| contract_error(token, "symbol", e))
    }
}

/// Sequential, rate-limited balance reader
#[derive(Debug, Clone)]
pub struct BalanceAggregator {
    /// Pause between two contracts
    inter_call_delay: Duration,
}

impl BalanceAggregator {
    pub fn new(inter_call_delay: Duration) -> Self {
        Self { inter_call_delay }
    }

    /// One record per contract, in input order
    pub async fn fetch_all<R: TokenReader + ?Sized>(
        &self,
        reader: &R,
        contracts: &[Address],
        owner: Address,
    ) -> Vec<BalanceRecord> {
        let mut records = Vec::with_capacity(contracts.len());

        for (i, &token) in contracts.iter().enumerate() {
            if i > 0 && !self.inter_call_delay.is_zero() {
                tokio::time::sleep(self.inter_call_delay).await;
            }

            let reads = tokio::try_join!(
                reader.balance_of(token, owner),
                reader.decimals(token),
                reader.symbol(token),
            );

            match reads {
                Ok((balance, decimals, symbol)) => {
                    debug!("{} balance of {:?}: {}", symbol, owner, balance);
                    records.push(BalanceRecord {
                        symbol,
                        balance,
                        decimals,
                    });
                }
                Err(e) => {
                    warn!("Could not read token {:?}: {}", token, e);
                    records.push(BalanceRecord::unknown());
                }
            }
        }

        records
    }
}

/// Balances the parameter resolver needs, wherever they come from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Native currency balance, in wei
    async fn native_balance(&self, network: &str) -> BridgeResult<U256>;

    /// Token balances, one record per contract in input order
    async fn token_balances(
        &self,
        network: &str,
        contracts: &[Address],
    ) -> BridgeResult<Vec<BalanceRecord>>;
}

/// Live balances for one account, read through the endpoint pools
pub struct ChainBalances<'a> {
    chains: &'a ChainManager,
    owner: Address,
    aggregator: BalanceAggregator,
}

impl<'a> ChainBalances<'a> {
    pub fn new(chains: &'a ChainManager, owner: Address, inter_call_delay: Duration) -> Self {
        Self {
            chains,
            owner,
            aggregator: BalanceAggregator::new(inter_call_delay),
        }
    }
}

#[async_trait]
impl BalanceSource for ChainBalances<'_> {
    async fn native_balance(&self, network: &str) -> BridgeResult<U256> {
        let provider = self.chains.acquire(network).await?;
        provider
            .get_balance(self.owner, None)
            .await
            .map_err(|e| BridgeError::Rpc {
                network: network.to_string(),
                message: e.to_string(),
            })
    }

    async fn token_balances(
        &self,
        network: &str,
        contracts: &[Address],
    ) -> BridgeResult<Vec<BalanceRecord>> {
        let provider = self.chains.acquire(network).await?;
        Ok(self
            .aggregator
            .fetch_all(&provider, contracts, self.owner)
            .await)
    }
}
