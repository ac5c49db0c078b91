//! Contract bindings: ERC20 reads, the wrap contract and the LayerZero OFT

use crate::error::{BridgeError, BridgeResult};
use crate::transfer::TransferRequest;

use async_trait::async_trait;
use ethers::abi::{Abi, Detokenize, Token};
use ethers::contract::{abigen, Contract, ContractCall};
use ethers::providers::Middleware;
use ethers::types::{Address, H256, U256};
use lazy_static::lazy_static;
use std::sync::Arc;
use tracing::{debug, info};

abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function decimals() external view returns (uint8)
        function symbol() external view returns (string)
    ]"#
);

abigen!(
    WrappedAlpha,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function depositTao(uint256 amount) external
        function withdrawTao(uint256 amount) external
    ]"#
);

const OFT_ABI_JSON: &str = r#"[
  {
    "type": "function",
    "name": "quoteSend",
    "stateMutability": "view",
    "inputs": [
      {
        "name": "sendParam",
        "type": "tuple",
        "components": [
          { "name": "dstEid", "type": "uint32" },
          { "name": "to", "type": "bytes32" },
          { "name": "amountLD", "type": "uint256" },
          { "name": "minAmountLD", "type": "uint256" },
          { "name": "extraOptions", "type": "bytes" },
          { "name": "composeMsg", "type": "bytes" },
          { "name": "oftCmd", "type": "bytes" }
        ]
      },
      { "name": "payInLzToken", "type": "bool" }
    ],
    "outputs": [
      {
        "name": "msgFee",
        "type": "tuple",
        "components": [
          { "name": "nativeFee", "type": "uint256" },
          { "name": "lzTokenFee", "type": "uint256" }
        ]
      }
    ]
  },
  {
    "type": "function",
    "name": "send",
    "stateMutability": "payable",
    "inputs": [
      {
        "name": "sendParam",
        "type": "tuple",
        "components": [
          { "name": "dstEid", "type": "uint32" },
          { "name": "to", "type": "bytes32" },
          { "name": "amountLD", "type": "uint256" },
          { "name": "minAmountLD", "type": "uint256" },
          { "name": "extraOptions", "type": "bytes" },
          { "name": "composeMsg", "type": "bytes" },
          { "name": "oftCmd", "type": "bytes" }
        ]
      },
      {
        "name": "fee",
        "type": "tuple",
        "components": [
          { "name": "nativeFee", "type": "uint256" },
          { "name": "lzTokenFee", "type": "uint256" }
        ]
      },
      { "name": "refundAddress", "type": "address" }
    ],
    "outputs": [
      {
        "name": "msgReceipt",
        "type": "tuple",
        "components": [
          { "name": "guid", "type": "bytes32" },
          { "name": "nonce", "type": "uint64" },
          {
            "name": "fee",
            "type": "tuple",
            "components": [
              { "name": "nativeFee", "type": "uint256" },
              { "name": "lzTokenFee", "type": "uint256" }
            ]
          }
        ]
      },
      {
        "name": "oftReceipt",
        "type": "tuple",
        "components": [
          { "name": "amountSentLD", "type": "uint256" },
          { "name": "amountReceivedLD", "type": "uint256" }
        ]
      }
    ]
  }
]"#;

lazy_static! {
    static ref OFT_ABI: Abi = serde_json::from_str(OFT_ABI_JSON).unwrap();
}

/// Cross-chain messaging fee, in canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessagingFee {
    /// Fee payable in the source chain's native currency
    pub native_fee: U256,
    /// Fee payable in the messaging network's own token
    pub alt_token_fee: U256,
}

impl MessagingFee {
    /// Normalize a quote result.
    ///
    /// Depending on the ABI the contract was compiled with, the fee comes back
    /// either as one struct or as two positional values. Both collapse here so
    /// nothing downstream has to care.
    pub fn from_token(token: Token) -> BridgeResult<Self> {
        let fields = match token {
            Token::Tuple(fields) => fields,
            other => {
                return Err(BridgeError::Quote(format!(
                    "unexpected fee shape: {:?}",
                    other
                )))
            }
        };

        let fields = match fields.as_slice() {
            [Token::Tuple(inner)] => inner.clone(),
            _ => fields,
        };

        match fields.as_slice() {
            [Token::Uint(native_fee), Token::Uint(alt_token_fee)] => Ok(Self {
                native_fee: *native_fee,
                alt_token_fee: *alt_token_fee,
            }),
            other => Err(BridgeError::Quote(format!(
                "unexpected fee fields: {:?}",
                other
            ))),
        }
    }

    fn into_token(self) -> Token {
        Token::Tuple(vec![
            Token::Uint(self.native_fee),
            Token::Uint(self.alt_token_fee),
        ])
    }
}

/// ABI encoding of the OFT `SendParam` struct
fn send_param_token(request: &TransferRequest) -> Token {
    Token::Tuple(vec![
        Token::Uint(U256::from(request.destination_eid())),
        Token::FixedBytes(request.recipient_bytes32().as_bytes().to_vec()),
        Token::Uint(request.amount()),
        Token::Uint(request.min_amount()),
        Token::Bytes(request.options().to_vec()),
        Token::Bytes(Vec::new()),
        Token::Bytes(Vec::new()),
    ])
}

/// The transfer-capable side of an OFT deployment
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OftEndpoint: Send + Sync {
    /// Ask the contract what sending `request` costs
    async fn quote_send(
        &self,
        request: &TransferRequest,
        pay_in_alt_token: bool,
    ) -> BridgeResult<MessagingFee>;

    /// Submit the transfer, paying `fee.native_fee`, and wait for inclusion
    async fn send(
        &self,
        request: &TransferRequest,
        fee: &MessagingFee,
        refund_address: Address,
    ) -> BridgeResult<H256>;
}

/// OFT contract client backed by a signing middleware
pub struct OftClient<M: Middleware> {
    contract: Contract<M>,
}

impl<M: Middleware + 'static> OftClient<M> {
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            contract: Contract::new(address, OFT_ABI.clone(), client),
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> OftEndpoint for OftClient<M> {
    async fn quote_send(
        &self,
        request: &TransferRequest,
        pay_in_alt_token: bool,
    ) -> BridgeResult<MessagingFee> {
        let call = self
            .contract
            .method::<_, Token>("quoteSend", (send_param_token(request), pay_in_alt_token))
            .map_err(|e| BridgeError::Quote(e.to_string()))?;

        let output = call
            .call()
            .await
            .map_err(|e| BridgeError::Quote(e.to_string()))?;

        let fee = MessagingFee::from_token(output)?;
        debug!("Quoted fee for {:?}: {:?}", request.token(), fee);
        Ok(fee)
    }

    async fn send(
        &self,
        request: &TransferRequest,
        fee: &MessagingFee,
        refund_address: Address,
    ) -> BridgeResult<H256> {
        let call = self
            .contract
            .method::<_, Token>(
                "send",
                (send_param_token(request), fee.into_token(), refund_address),
            )
            .map_err(|e| BridgeError::Submission(e.to_string()))?
            .value(fee.native_fee);

        send_call(call).await
    }
}

/// Send a state-changing call and wait for a successful receipt
pub async fn send_call<M, D>(call: ContractCall<M, D>) -> BridgeResult<H256>
where
    M: Middleware + 'static,
    D: Detokenize,
{
    let pending = call
        .send()
        .await
        .map_err(|e| BridgeError::Submission(e.to_string()))?;
    let tx_hash = pending.tx_hash();
    info!("Transaction sent: {:?}", tx_hash);

    let receipt = pending
        .await
        .map_err(|e| BridgeError::Submission(e.to_string()))?
        .ok_or_else(|| {
            BridgeError::Submission(format!("transaction {:?} dropped from mempool", tx_hash))
        })?;

    if receipt.status != Some(1u64.into()) {
        return Err(BridgeError::Submission(format!(
            "transaction {:?} reverted",
            receipt.transaction_hash
        )));
    }

    Ok(receipt.transaction_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_and_positional_quotes_are_equivalent() {
        let native = U256::from(123_456_789u64);
        let alt = U256::zero();

        let as_struct = Token::Tuple(vec![Token::Tuple(vec![
            Token::Uint(native),
            Token::Uint(alt),
        ])]);
        let positional = Token::Tuple(vec![Token::Uint(native), Token::Uint(alt)]);

        let a = MessagingFee::from_token(as_struct).unwrap();
        let b = MessagingFee::from_token(positional).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.native_fee, native);
        assert_eq!(a.alt_token_fee, alt);
    }

    #[test]
    fn rejects_malformed_quote() {
        assert!(MessagingFee::from_token(Token::Uint(U256::one())).is_err());
        assert!(MessagingFee::from_token(Token::Tuple(vec![Token::Bool(true)])).is_err());
    }

    #[test]
    fn oft_abi_exposes_quote_and_send() {
        assert!(OFT_ABI.function("quoteSend").is_ok());
        assert!(OFT_ABI.function("send").is_ok());
    }

    #[test]
    fn fee_round_trips_into_send_argument() {
        let fee = MessagingFee {
            native_fee: U256::from(42),
            alt_token_fee: U256::zero(),
        };
        assert_eq!(MessagingFee::from_token(fee.into_token()).unwrap(), fee);
    }
}
