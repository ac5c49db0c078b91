//! Validated cross-chain transfer request

use crate::config::Settings;
use crate::error::{BridgeError, BridgeResult};

use ethers::types::{Address, Bytes, H256, U256};

/// Parameters collected by the resolver, not yet validated
#[derive(Debug, Clone)]
pub struct TransferDraft {
    pub source_chain: String,
    pub destination_chain: String,
    pub token: Address,
    pub amount: U256,
    pub recipient: Address,
}

/// Immutable once built; a retry needs a fresh request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    source_chain: String,
    destination_chain: String,
    destination_eid: u32,
    token: Address,
    amount: U256,
    recipient: Address,
    min_amount: U256,
    options: Bytes,
}

impl TransferRequest {
    /// Validate a draft against static configuration and the last observed balance
    pub fn build(
        settings: &Settings,
        draft: TransferDraft,
        observed_balance: U256,
    ) -> BridgeResult<Self> {
        if draft.source_chain == draft.destination_chain {
            return Err(BridgeError::SameChain(draft.source_chain));
        }

        settings.eid(&draft.source_chain)?;
        let destination_eid = settings.eid(&draft.destination_chain)?;

        if draft.amount.is_zero() {
            return Err(BridgeError::InvalidAmount("amount must be positive".to_string()));
        }
        if draft.amount > observed_balance {
            return Err(BridgeError::InsufficientBalance {
                have: observed_balance.to_string(),
                need: draft.amount.to_string(),
            });
        }

        Ok(Self {
            source_chain: draft.source_chain,
            destination_chain: draft.destination_chain,
            destination_eid,
            token: draft.token,
            amount: draft.amount,
            recipient: draft.recipient,
            // No slippage guard, default executor options
            min_amount: U256::zero(),
            options: Bytes::new(),
        })
    }

    pub fn source_chain(&self) -> &str {
        &self.source_chain
    }

    pub fn destination_chain(&self) -> &str {
        &self.destination_chain
    }

    pub fn destination_eid(&self) -> u32 {
        self.destination_eid
    }

    pub fn token(&self) -> Address {
        self.token
    }

    /// Amount in the token's smallest unit
    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn recipient(&self) -> Address {
        self.recipient
    }

    pub fn min_amount(&self) -> U256 {
        self.min_amount
    }

    pub fn options(&self) -> &Bytes {
        &self.options
    }

    /// Recipient left-padded to 32 bytes, as the OFT `to` field expects
    pub fn recipient_bytes32(&self) -> H256 {
        let mut padded = [0u8; 32];
        padded[12..].copy_from_slice(self.recipient.as_bytes());
        H256(padded)
    }
}
