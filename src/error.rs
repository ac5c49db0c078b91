//! Error types for the Wrapped Alpha bridge

use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network {0} not found")]
    NetworkNotFound(String),

    #[error("Chain {0} not supported for bridging")]
    ChainNotBridgeable(String),

    #[error("Source and destination chain are both {0}")]
    SameChain(String),

    #[error("Netuid {netuid} has no contract on {network}")]
    AssetNotFound { netuid: String, network: String },

    #[error("RPC error on {network}: {message}")]
    Rpc { network: String, message: String },

    #[error("All RPC endpoints for {network} are unavailable")]
    AllEndpointsUnavailable { network: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: String, need: String },

    #[error("No valid {field} after {attempts} attempts")]
    InputExhausted { field: String, attempts: u32 },

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Fee quote failed: {0}")]
    Quote(String),

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Delivery status service returned HTTP {status}")]
    StatusService { status: u16 },

    #[error("Delivery status request failed: {0}")]
    StatusTransport(String),

    #[error("Malformed delivery status response: {0}")]
    StatusDecode(String),

    #[error("Delivery confirmation failed for {tx_hash} ({explorer_url}): {source}")]
    Confirmation {
        tx_hash: String,
        explorer_url: String,
        #[source]
        source: Box<BridgeError>,
    },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Rpc { .. })
    }

    /// Errors caused by static configuration; retrying cannot help
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BridgeError::Config(_)
                | BridgeError::NetworkNotFound(_)
                | BridgeError::ChainNotBridgeable(_)
                | BridgeError::SameChain(_)
                | BridgeError::AssetNotFound { .. }
        )
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
