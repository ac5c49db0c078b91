//! LayerZero delivery-status polling
//!
//! The scan API only learns about a message some time after the source
//! transaction is mined. 404 and 400 mean "not indexed yet", as does a 2xx
//! with no records. Any other non-2xx status, a transport failure or an
//! unparseable body stops the poll immediately.

use crate::error::{BridgeError, BridgeResult};
use crate::ui::Ticker;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Terminal status reported for a delivered message
pub const DELIVERED: &str = "DELIVERED";

/// Status some deployments report once the destination has executed
pub const DELIVERED_DST: &str = "DELIVERED_DST";

/// Raw HTTP reply from the status service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReply {
    pub status: u16,
    pub body: String,
}

impl StatusReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Where delivery status comes from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, tx_hash: &str) -> BridgeResult<StatusReply>;
}

/// `GET {base}/v1/messages/tx/{hash}` against the LayerZero scan API
pub struct LayerZeroScan {
    client: Client,
    base_url: String,
}

impl LayerZeroScan {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> BridgeResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BridgeError::StatusTransport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn message_url(&self, tx_hash: &str) -> String {
        format!("{}/v1/messages/tx/{}", self.base_url, tx_hash)
    }
}

#[async_trait]
impl StatusSource for LayerZeroScan {
    async fn fetch(&self, tx_hash: &str) -> BridgeResult<StatusReply> {
        let response = self
            .client
            .get(self.message_url(tx_hash))
            .send()
            .await
            .map_err(|e| BridgeError::StatusTransport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::StatusTransport(e.to_string()))?;

        Ok(StatusReply { status, body })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    data: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    status: Option<MessageStatus>,
}

#[derive(Debug, Deserialize)]
struct MessageStatus {
    name: Option<String>,
}

/// What one poll learned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The indexer has not seen the message yet
    NotIndexed,
    /// The message is indexed; its status name, if the record carried one
    Status(Option<String>),
}

/// Classify a reply, failing on anything that should stop the poll
pub fn classify(reply: &StatusReply) -> BridgeResult<Observation> {
    match reply.status {
        404 | 400 => return Ok(Observation::NotIndexed),
        200..=299 => {}
        status => return Err(BridgeError::StatusService { status }),
    }

    let parsed: MessagesResponse = serde_json::from_str(&reply.body)
        .map_err(|e| BridgeError::StatusDecode(e.to_string()))?;

    Ok(match parsed.data.into_iter().next() {
        None => Observation::NotIndexed,
        Some(message) => Observation::Status(message.status.and_then(|s| s.name)),
    })
}

/// How long to keep asking
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl PollSettings {
    /// Hard wall-clock limit for a whole confirmation poll
    pub fn wall_clock_bound(&self) -> Duration {
        self.interval * (self.max_attempts + 1) + self.request_timeout
    }
}

/// Result of a poll that did not hit a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Delivered { polls: u32 },
    TimedOut { last_status: Option<String>, polls: u32 },
}

/// Poll until the message is delivered, the attempts run out, or a fatal reply
pub async fn poll_until_delivered<S: StatusSource + ?Sized>(
    source: &S,
    tx_hash: &str,
    settings: PollSettings,
    ticker: &mut Ticker,
) -> BridgeResult<PollResult> {
    let mut last_status: Option<String> = None;
    let mut polls = 0u32;

    let polling = async {
        for attempt in 1..=settings.max_attempts {
            polls = attempt;

            let reply = source.fetch(tx_hash).await?;
            match classify(&reply)? {
                Observation::Status(Some(name)) if name == DELIVERED => {
                    return Ok(true);
                }
                Observation::Status(name) => {
                    debug!("Message {} status {:?} (poll {})", tx_hash, name, attempt);
                    if name.is_some() {
                        last_status = name;
                    }
                    ticker.tick();
                }
                Observation::NotIndexed => {
                    debug!("Message {} not indexed yet (poll {})", tx_hash, attempt);
                }
            }

            if attempt < settings.max_attempts {
                tokio::time::sleep(settings.interval).await;
            }
        }
        Ok::<bool, BridgeError>(false)
    };

    let finished = tokio::time::timeout(settings.wall_clock_bound(), polling).await;

    match finished {
        Ok(Ok(true)) => Ok(PollResult::Delivered { polls }),
        Ok(Ok(false)) => Ok(PollResult::TimedOut { last_status, polls }),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!("Delivery polling for {} hit the wall-clock limit", tx_hash);
            Ok(PollResult::TimedOut { last_status, polls })
        }
    }
}
