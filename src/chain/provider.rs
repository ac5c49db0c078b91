//! Endpoint pool with multi-RPC failover
//!
//! Every acquisition probes candidates in round-robin order starting at the
//! last endpoint that answered, so a connection handed out has always been
//! checked during that same call. A connection that fails its probe is dropped
//! on the spot and never handed out or retried by the pool.

use crate::error::{BridgeError, BridgeResult};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Opens connections to an RPC URL and checks that they are alive
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Send + Sync;

    /// Build a fresh connection handle for `url`
    fn connect(&self, url: &str) -> BridgeResult<Self::Connection>;

    /// Cheap liveness call, returns the current chain height
    async fn probe(&self, connection: &Self::Connection) -> BridgeResult<u64>;
}

/// JSON-RPC over HTTP using ethers providers
#[derive(Debug, Clone)]
pub struct HttpConnector {
    poll_interval: Duration,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for HttpConnector {
    type Connection = Provider<Http>;

    fn connect(&self, url: &str) -> BridgeResult<Self::Connection> {
        Provider::<Http>::try_from(url)
            .map(|provider| provider.interval(self.poll_interval))
            .map_err(|e| BridgeError::Config(format!("Invalid RPC URL {}: {}", url, e)))
    }

    async fn probe(&self, connection: &Self::Connection) -> BridgeResult<u64> {
        connection
            .get_block_number()
            .await
            .map(|block| block.as_u64())
            .map_err(|e| BridgeError::Rpc {
                network: connection.url().to_string(),
                message: e.to_string(),
            })
    }
}

/// Candidate RPC endpoints for one network
pub struct EndpointPool<C: Connector = HttpConnector> {
    /// Network id
    network: String,
    /// Candidate URLs, in configured order
    urls: Vec<String>,
    /// Connection factory
    connector: C,
    /// Index of the last endpoint that passed a probe
    current: AtomicUsize,
}

impl<C: Connector> EndpointPool<C> {
    /// Create a new pool; the first configured URL is tried first
    pub fn new(network: impl Into<String>, urls: Vec<String>, connector: C) -> Self {
        Self {
            network: network.into(),
            urls,
            connector,
            current: AtomicUsize::new(0),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Index the next acquisition starts probing from
    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// Return a freshly probed connection, failing over across candidates
    pub async fn acquire(&self) -> BridgeResult<C::Connection> {
        let len = self.urls.len();
        let start = self.current_index();

        for offset in 0..len {
            let idx = (start + offset) % len;
            let url = &self.urls[idx];

            let connection = match self.connector.connect(url) {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("Skipping endpoint {} for {}: {}", url, self.network, e);
                    continue;
                }
            };

            match self.connector.probe(&connection).await {
                Ok(height) => {
                    if idx != start {
                        warn!("{} failover to endpoint {} ({})", self.network, idx, url);
                    }
                    self.current.store(idx, Ordering::Relaxed);
                    debug!("{} endpoint {} live at height {}", self.network, url, height);
                    return Ok(connection);
                }
                Err(e) => {
                    warn!("Endpoint {} for {} failed probe: {}", url, self.network, e);
                    drop(connection);
                }
            }
        }

        Err(BridgeError::AllEndpointsUnavailable {
            network: self.network.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Connections are the URL itself; URLs in `dead` fail their probe
    #[derive(Default)]
    pub struct FakeConnector {
        pub dead: Mutex<HashSet<String>>,
        pub probed: Mutex<Vec<String>>,
    }

    impl FakeConnector {
        pub fn with_dead(dead: &[&str]) -> Self {
            Self {
                dead: Mutex::new(dead.iter().map(|s| s.to_string()).collect()),
                probed: Mutex::new(Vec::new()),
            }
        }

        pub fn kill(&self, url: &str) {
            self.dead.lock().unwrap().insert(url.to_string());
        }

        pub fn take_probed(&self) -> Vec<String> {
            std::mem::take(&mut *self.probed.lock().unwrap())
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        type Connection = String;

        fn connect(&self, url: &str) -> BridgeResult<String> {
            Ok(url.to_string())
        }

        async fn probe(&self, connection: &String) -> BridgeResult<u64> {
            self.probed.lock().unwrap().push(connection.clone());
            if self.dead.lock().unwrap().contains(connection) {
                Err(BridgeError::Rpc {
                    network: connection.clone(),
                    message: "connection refused".to_string(),
                })
            } else {
                Ok(100)
            }
        }
    }

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn skips_dead_endpoints_and_remembers_live_one() {
        let pool = EndpointPool::new(
            "tao",
            urls(&["dead-1", "dead-2", "live"]),
            FakeConnector::with_dead(&["dead-1", "dead-2"]),
        );

        assert_eq!(pool.acquire().await.unwrap(), "live");
        assert_eq!(pool.current_index(), 2);
        assert_eq!(pool.connector.take_probed(), urls(&["dead-1", "dead-2", "live"]));

        // Sticky: the next call starts at the live endpoint
        assert_eq!(pool.acquire().await.unwrap(), "live");
        assert_eq!(pool.connector.take_probed(), urls(&["live"]));
    }

    #[tokio::test]
    async fn all_dead_fails_without_moving_cursor() {
        let pool = EndpointPool::new(
            "eth",
            urls(&["a", "b", "c"]),
            FakeConnector::with_dead(&["a", "b", "c"]),
        );

        match pool.acquire().await {
            Err(BridgeError::AllEndpointsUnavailable { network }) => assert_eq!(network, "eth"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(pool.current_index(), 0);
        assert_eq!(pool.connector.take_probed(), urls(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn wraps_around_when_sticky_endpoint_dies() {
        let pool = EndpointPool::new("tao", urls(&["a", "b", "c"]), FakeConnector::with_dead(&["a"]));

        assert_eq!(pool.acquire().await.unwrap(), "b");
        pool.connector.kill("b");
        pool.connector.kill("c");
        pool.connector.dead.lock().unwrap().remove("a");
        pool.connector.take_probed();

        assert_eq!(pool.acquire().await.unwrap(), "a");
        assert_eq!(pool.connector.take_probed(), urls(&["b", "c", "a"]));
        assert_eq!(pool.current_index(), 0);
    }

    #[test]
    fn http_connector_rejects_malformed_url() {
        let connector = HttpConnector::new();
        assert!(matches!(
            connector.connect("not a url"),
            Err(BridgeError::Config(_))
        ));
        assert!(connector.connect("http://localhost:8545").is_ok());
    }
}
