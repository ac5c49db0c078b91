//! Local signing key
//!
//! The key is a hex private key or a BIP-39 phrase, read from the configured
//! environment variable or key file. It is never logged.

use crate::chain::{EndpointPool, HttpConnector};
use crate::config::WalletConfig;
use crate::error::{BridgeError, BridgeResult};

use blake2::digest::{consts::U32, Digest};
use blake2::{Blake2b, Blake2b512};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer};
use ethers::types::{Address, U256};
use std::path::Path;
use tracing::{debug, info};

/// Generic Substrate address format, as used by Bittensor
pub const SS58_PREFIX: u8 = 42;

/// Provider that signs with the local key
pub type SigningClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct Wallet {
    signer: LocalWallet,
}

impl Wallet {
    /// Load from the environment first, then the key file
    pub fn load(config: &WalletConfig) -> BridgeResult<Self> {
        if let Some(var) = &config.key_env {
            if let Ok(secret) = std::env::var(var) {
                debug!("Loading wallet from ${}", var);
                return Self::from_secret(&secret);
            }
        }

        if let Some(file) = &config.key_file {
            let path = Path::new(file);
            if path.exists() {
                debug!("Loading wallet from {}", path.display());
                let secret = std::fs::read_to_string(path)?;
                return Self::from_secret(&secret);
            }
        }

        Err(BridgeError::Wallet(format!(
            "No wallet configured. Set {} or create {} with a private key or phrase",
            config.key_env.as_deref().unwrap_or("a key variable"),
            config.key_file.as_deref().unwrap_or("a key file"),
        )))
    }

    /// Parse a hex private key or a mnemonic phrase
    pub fn from_secret(secret: &str) -> BridgeResult<Self> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(BridgeError::Wallet("Key is empty".to_string()));
        }

        let looks_hex = secret.starts_with("0x")
            || (secret.len() == 64 && secret.chars().all(|c| c.is_ascii_hexdigit()));

        let signer = if looks_hex {
            secret
                .parse::<LocalWallet>()
                .map_err(|e| BridgeError::Wallet(format!("Invalid private key: {}", e)))?
        } else {
            MnemonicBuilder::<English>::default()
                .phrase(secret)
                .build()
                .map_err(|e| BridgeError::Wallet(format!("Invalid phrase: {}", e)))?
        };

        info!("Wallet loaded: {:?}", signer.address());
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The Substrate account that mirrors this EVM address
    pub fn ss58_address(&self) -> String {
        h160_to_ss58(self.address())
    }

    /// Signing client on a freshly probed endpoint
    pub async fn signer(&self, pool: &EndpointPool<HttpConnector>) -> BridgeResult<SigningClient> {
        let provider = pool.acquire().await?;
        SignerMiddleware::new_with_provider_chain(provider, self.signer.clone())
            .await
            .map_err(|e| BridgeError::Wallet(format!("Failed to build signer for {}: {}", pool.network(), e)))
    }

    /// Native balance in wei
    pub async fn native_balance(&self, pool: &EndpointPool<HttpConnector>) -> BridgeResult<U256> {
        let provider = pool.acquire().await?;
        provider
            .get_balance(self.address(), None)
            .await
            .map_err(|e| BridgeError::Rpc {
                network: pool.network().to_string(),
                message: e.to_string(),
            })
    }
}

/// Map an H160 into its 32-byte account (`blake2b-256("evm:" ++ h160)`) and SS58-encode it
pub fn h160_to_ss58(address: Address) -> String {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(b"evm:");
    hasher.update(address.as_bytes());
    let mut account = [0u8; 32];
    account.copy_from_slice(&hasher.finalize());
    encode_ss58(&account, SS58_PREFIX)
}

/// Single-byte prefix only; checksum is the first two bytes of `blake2b-512("SS58PRE" ++ payload)`
pub fn encode_ss58(account: &[u8; 32], prefix: u8) -> String {
    let mut payload = Vec::with_capacity(35);
    payload.push(prefix);
    payload.extend_from_slice(account);

    let checksum = Blake2b512::new()
        .chain_update(b"SS58PRE")
        .chain_update(&payload)
        .finalize();
    payload.extend_from_slice(&checksum[..2]);

    bs58::encode(payload).into_string()
}
