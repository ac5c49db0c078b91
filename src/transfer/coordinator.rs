//! Cross-chain transfer coordinator
//!
//! Runs a validated request through quote, submit and confirm, in that order,
//! and classifies the result. Only an exact `DELIVERED` counts as delivered;
//! anything else the poller ends with is reported as unconfirmed.

use super::request::TransferRequest;
use super::status::{poll_until_delivered, PollResult, PollSettings, StatusSource, DELIVERED_DST};
use crate::chain::{MessagingFee, OftEndpoint};
use crate::config::Settings;
use crate::error::{BridgeError, BridgeResult};
use crate::ui::{self, Ticker};

use ethers::types::{Address, H256};
use tracing::{debug, info, warn};

/// Lifecycle of a submitted transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Submitted,
    PendingConfirmation,
    Delivered,
    /// Destination reported an alternative terminal status; verify manually
    DeliveredAlt,
    FailedTimeout,
    FailedError,
}

/// Final report handed back to the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub delivered: bool,
    pub status: TransferStatus,
    pub transaction_hash: H256,
    pub explorer_url: String,
    /// Last status name the indexer reported, if any
    pub last_reported: Option<String>,
    pub polls: u32,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub poll: PollSettings,
    /// Scan link template with a `{hash}` placeholder
    pub scan_tx_url: String,
}

impl CoordinatorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll: PollSettings {
                interval: settings.bridge.poll_interval(),
                max_attempts: settings.bridge.poll_max_attempts,
                request_timeout: settings.bridge.request_timeout(),
            },
            scan_tx_url: settings.bridge.scan_tx_url.clone(),
        }
    }

    fn scan_url(&self, tx_hash: &str) -> String {
        self.scan_tx_url.replace("{hash}", tx_hash)
    }
}

/// Executes one transfer request end to end
pub struct Coordinator<E, S> {
    endpoint: E,
    status: S,
    config: CoordinatorConfig,
}

impl<E: OftEndpoint, S: StatusSource> Coordinator<E, S> {
    pub fn new(endpoint: E, status: S, config: CoordinatorConfig) -> Self {
        Self {
            endpoint,
            status,
            config,
        }
    }

    /// Native-currency fee for sending `request`
    pub async fn quote(&self, request: &TransferRequest) -> BridgeResult<MessagingFee> {
        self.endpoint.quote_send(request, false).await
    }

    /// Submit and wait for inclusion on the source chain
    pub async fn submit(
        &self,
        request: &TransferRequest,
        fee: &MessagingFee,
        refund_address: Address,
    ) -> BridgeResult<H256> {
        self.endpoint.send(request, fee, refund_address).await
    }

    /// Poll the delivery-status service for a submitted transaction
    pub async fn confirm(&self, tx_hash: H256) -> BridgeResult<TransferOutcome> {
        let hash = format!("{:?}", tx_hash);
        let explorer_url = self.config.scan_url(&hash);

        debug!("Transfer {} is {:?}", hash, TransferStatus::PendingConfirmation);
        ui::progress(format!(
            "Waiting for delivery (up to {} checks)",
            self.config.poll.max_attempts
        ));

        let mut ticker = Ticker::default();
        let polled = poll_until_delivered(&self.status, &hash, self.config.poll, &mut ticker).await;
        ticker.finish();

        let result = match polled {
            Ok(result) => result,
            Err(e) => {
                warn!("Transfer {} is {:?}: {}", hash, TransferStatus::FailedError, e);
                return Err(BridgeError::Confirmation {
                    tx_hash: hash,
                    explorer_url,
                    source: Box::new(e),
                });
            }
        };

        let outcome = match result {
            PollResult::Delivered { polls } => TransferOutcome {
                delivered: true,
                status: TransferStatus::Delivered,
                transaction_hash: tx_hash,
                explorer_url,
                last_reported: Some(super::status::DELIVERED.to_string()),
                polls,
            },
            PollResult::TimedOut { last_status, polls } => {
                let status = match last_status.as_deref() {
                    Some(DELIVERED_DST) => TransferStatus::DeliveredAlt,
                    _ => TransferStatus::FailedTimeout,
                };
                TransferOutcome {
                    delivered: false,
                    status,
                    transaction_hash: tx_hash,
                    explorer_url,
                    last_reported: last_status,
                    polls,
                }
            }
        };

        info!(
            "Transfer {} finished as {:?} after {} polls",
            hash, outcome.status, outcome.polls
        );
        Ok(outcome)
    }

    /// Quote, submit and confirm
    pub async fn execute(
        &self,
        request: &TransferRequest,
        refund_address: Address,
    ) -> BridgeResult<TransferOutcome> {
        ui::progress("Quoting messaging fee");
        let fee = self.quote(request).await?;
        ui::progress(format!("Fee: {} native", ui::format_amount(fee.native_fee, 18)));

        ui::progress("Submitting transfer");
        let tx_hash = self.submit(request, &fee, refund_address).await?;
        debug!("Transfer {:?} is {:?}", tx_hash, TransferStatus::Submitted);
        ui::progress(format!("Included in transaction {:?}", tx_hash));

        self.confirm(tx_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::contracts::MockOftEndpoint;
    use crate::config::tests::{test_settings, TOKEN_A};
    use crate::resolve::input::{parse_amount, FieldOutcome};
    use crate::transfer::status::tests::{settings as poll_settings, status_body, ScriptedStatus};
    use crate::transfer::status::{MockStatusSource, StatusReply};
    use crate::transfer::TransferDraft;
    use ethers::types::U256;
    use std::str::FromStr;

    fn config(max_attempts: u32) -> CoordinatorConfig {
        CoordinatorConfig {
            poll: poll_settings(max_attempts),
            scan_tx_url: "https://scan.local/tx/{hash}".to_string(),
        }
    }

    fn request(amount: U256, balance: U256) -> TransferRequest {
        TransferRequest::build(
            &test_settings(),
            TransferDraft {
                source_chain: "tao".to_string(),
                destination_chain: "eth".to_string(),
                token: Address::from_str(TOKEN_A).unwrap(),
                amount,
                recipient: Address::repeat_byte(0xab),
            },
            balance,
        )
        .unwrap()
    }

    fn fee() -> MessagingFee {
        MessagingFee {
            native_fee: U256::from(777_000u64),
            alt_token_fee: U256::zero(),
        }
    }

    #[tokio::test]
    async fn transfers_full_balance_end_to_end() {
        let balance = U256::from(1000);
        let amount = match parse_amount("all", balance, 9) {
            FieldOutcome::Valid(amount) => amount,
            other => panic!("unexpected: {:?}", other),
        };
        assert_eq!(amount, U256::from(1000));

        let request = request(amount, balance);
        let refund = Address::repeat_byte(0xcd);
        let tx_hash = H256::repeat_byte(0x42);

        let mut endpoint = MockOftEndpoint::new();
        endpoint
            .expect_quote_send()
            .withf(|req, pay_in_alt| req.amount() == U256::from(1000) && !*pay_in_alt)
            .times(1)
            .returning(|_, _| Ok(fee()));
        endpoint
            .expect_send()
            .withf(move |req, quoted, refund_to| {
                req.destination_eid() == 30101 && *quoted == fee() && *refund_to == refund
            })
            .times(1)
            .returning(move |_, _, _| Ok(tx_hash));

        let status = ScriptedStatus::new(vec![
            StatusReply::new(404, ""),
            StatusReply::new(404, ""),
            StatusReply::new(200, status_body("PENDING")),
            StatusReply::new(200, status_body("DELIVERED")),
        ]);

        let coordinator = Coordinator::new(endpoint, status, config(120));
        let outcome = coordinator.execute(&request, refund).await.unwrap();

        assert!(outcome.delivered);
        assert_eq!(outcome.status, TransferStatus::Delivered);
        assert_eq!(outcome.polls, 4);
        assert_eq!(outcome.transaction_hash, tx_hash);
        assert_eq!(
            outcome.explorer_url,
            format!("https://scan.local/tx/{:?}", tx_hash)
        );
    }

    #[tokio::test]
    async fn quote_failure_never_submits() {
        let mut endpoint = MockOftEndpoint::new();
        endpoint
            .expect_quote_send()
            .times(1)
            .returning(|_, _| Err(BridgeError::Quote("execution reverted".to_string())));
        endpoint.expect_send().never();

        let mut status = MockStatusSource::new();
        status.expect_fetch().never();

        let coordinator = Coordinator::new(endpoint, status, config(3));
        let err = coordinator
            .execute(&request(U256::from(10), U256::from(10)), Address::zero())
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Quote(_)));
    }

    #[tokio::test]
    async fn reverted_send_is_surfaced_verbatim() {
        let mut endpoint = MockOftEndpoint::new();
        endpoint.expect_quote_send().returning(|_, _| Ok(fee()));
        endpoint
            .expect_send()
            .returning(|_, _, _| Err(BridgeError::Submission("transaction 0x01 reverted".to_string())));

        let mut status = MockStatusSource::new();
        status.expect_fetch().never();

        let coordinator = Coordinator::new(endpoint, status, config(3));
        let err = coordinator
            .execute(&request(U256::from(10), U256::from(10)), Address::zero())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Transaction submission failed: transaction 0x01 reverted"
        );
    }

    #[tokio::test]
    async fn timeout_is_unconfirmed_not_an_error() {
        let coordinator = Coordinator::new(
            MockOftEndpoint::new(),
            ScriptedStatus::new(Vec::new()),
            config(4),
        );

        let outcome = coordinator.confirm(H256::repeat_byte(1)).await.unwrap();

        assert!(!outcome.delivered);
        assert_eq!(outcome.status, TransferStatus::FailedTimeout);
        assert_eq!(outcome.last_reported, None);
        assert_eq!(outcome.polls, 4);
    }

    #[tokio::test]
    async fn alternative_terminal_status_is_reported_separately() {
        let coordinator = Coordinator::new(
            MockOftEndpoint::new(),
            ScriptedStatus::new(vec![
                StatusReply::new(200, status_body("INFLIGHT")),
                StatusReply::new(200, status_body(DELIVERED_DST)),
            ]),
            config(2),
        );

        let outcome = coordinator.confirm(H256::repeat_byte(1)).await.unwrap();

        assert!(!outcome.delivered);
        assert_eq!(outcome.status, TransferStatus::DeliveredAlt);
    }

    #[tokio::test]
    async fn fatal_poll_carries_the_explorer_link() {
        let mut status = MockStatusSource::new();
        status
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(StatusReply::new(503, "unavailable")));

        let coordinator = Coordinator::new(MockOftEndpoint::new(), status, config(120));
        let err = coordinator.confirm(H256::repeat_byte(2)).await.unwrap_err();

        match err {
            BridgeError::Confirmation {
                explorer_url,
                source,
                ..
            } => {
                assert!(explorer_url.starts_with("https://scan.local/tx/0x0202"));
                assert!(matches!(*source, BridgeError::StatusService { status: 503 }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
