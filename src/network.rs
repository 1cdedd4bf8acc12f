//! Peer networking for FileChain
//!
//! - [`PeerDirectory`]: deduplicated set of peer base URLs
//! - [`PeerTransport`]: the seam every peer call goes through
//! - [`HttpTransport`]: `reqwest` implementation with per-call timeouts
//! - [`NetworkNode`]: best-effort transaction fan-out and chain collection
//!
//! No peer call is ever made while the ledger lock is held.

use crate::blockchain::Block;
use crate::config::NetworkConfig;
use crate::error::ChainError;
use crate::transaction::TransactionRecord;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::RwLock;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header set on forwarded transactions. A node that receives a relayed
/// transaction keeps it but does not forward it again.
pub const RELAY_HEADER: &str = "x-filechain-relay";

/// The `/chain` listing as served by every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub length: usize,
    pub chain: Vec<Block>,
}

impl ChainSnapshot {
    pub fn new(chain: Vec<Block>) -> Self {
        Self {
            length: chain.len(),
            chain,
        }
    }
}

/// Trims whitespace and trailing slashes and checks the URL is an absolute
/// http(s) address with a host.
pub fn normalize_peer_url(raw: &str) -> Result<String, ChainError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ChainError::InvalidPeer("peer is required".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|_| ChainError::InvalidPeer("peer must be an http(s) URL".to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ChainError::InvalidPeer("peer must be an http(s) URL".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Known peer nodes.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: RwLock<BTreeSet<String>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent add. Returns the directory snapshot after the insert.
    pub fn register(&self, url: &str) -> Result<Vec<String>, ChainError> {
        let url = normalize_peer_url(url)?;
        let mut peers = self.peers.write();
        if peers.insert(url.clone()) {
            debug!(peer = %url, "peer registered");
        }
        Ok(peers.iter().cloned().collect())
    }

    pub fn list(&self) -> Vec<String> {
        self.peers.read().iter().cloned().collect()
    }

    pub fn contains(&self, url: &str) -> bool {
        normalize_peer_url(url)
            .map(|url| self.peers.read().contains(&url))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

/// Calls a node makes on its peers.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// `POST {peer}/new_transaction`, marked as a relay.
    async fn submit_transaction(
        &self,
        peer: &str,
        record: &TransactionRecord,
    ) -> Result<(), ChainError>;

    /// `GET {peer}/chain`.
    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot, ChainError>;
}

/// HTTP transport backed by one shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ChainError::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Self, ChainError> {
        Self::new(config.peer_timeout(), config.peer_connect_timeout())
    }
}

fn peer_unreachable(peer: &str, err: reqwest::Error) -> ChainError {
    let reason = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    };
    ChainError::PeerUnreachable {
        peer: peer.to_string(),
        reason,
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn submit_transaction(
        &self,
        peer: &str,
        record: &TransactionRecord,
    ) -> Result<(), ChainError> {
        let response = self
            .client
            .post(format!("{}/new_transaction", peer))
            .header(RELAY_HEADER, "1")
            .json(record)
            .send()
            .await
            .map_err(|e| peer_unreachable(peer, e))?;

        if !response.status().is_success() {
            return Err(ChainError::InvalidPeerResponse {
                peer: peer.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(())
    }

    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot, ChainError> {
        let response = self
            .client
            .get(format!("{}/chain", peer))
            .send()
            .await
            .map_err(|e| peer_unreachable(peer, e))?;

        if !response.status().is_success() {
            return Err(ChainError::InvalidPeerResponse {
                peer: peer.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        response
            .json::<ChainSnapshot>()
            .await
            .map_err(|e| ChainError::InvalidPeerResponse {
                peer: peer.to_string(),
                reason: format!("malformed chain payload: {}", e),
            })
    }
}

/// Per-peer result of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDelivery {
    pub peer: String,
    pub status: DeliveryStatus,
}

impl PeerDelivery {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// Peer directory plus the transport used to reach it.
pub struct NetworkNode {
    directory: PeerDirectory,
    transport: Arc<dyn PeerTransport>,
    max_concurrency: usize,
}

impl NetworkNode {
    pub fn new(transport: Arc<dyn PeerTransport>, max_concurrency: usize) -> Self {
        Self {
            directory: PeerDirectory::new(),
            transport,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// HTTP-backed node with bootstrap peers registered.
    pub fn from_config(config: &NetworkConfig) -> Result<Self, ChainError> {
        let node = Self::new(
            Arc::new(HttpTransport::from_config(config)?),
            config.max_concurrent_peer_requests,
        );
        for peer in &config.bootstrap_peers {
            node.register_peer(peer)?;
        }
        Ok(node)
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    pub fn register_peer(&self, url: &str) -> Result<Vec<String>, ChainError> {
        self.directory.register(url)
    }

    pub fn list_peers(&self) -> Vec<String> {
        self.directory.list()
    }

    /// Forwards `record` to every known peer. A failing peer never affects
    /// delivery to the others; there is no retry.
    pub async fn broadcast_transaction(&self, record: &TransactionRecord) -> Vec<PeerDelivery> {
        let transport = &self.transport;
        stream::iter(self.directory.list())
            .map(|peer| async move {
                let status = match transport.submit_transaction(&peer, record).await {
                    Ok(()) => DeliveryStatus::Delivered,
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "transaction broadcast failed");
                        DeliveryStatus::Failed(e.to_string())
                    }
                };
                PeerDelivery { peer, status }
            })
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await
    }

    /// Fetches every peer's chain, in directory order.
    pub async fn fetch_chains(&self) -> Vec<(String, Result<ChainSnapshot, ChainError>)> {
        let transport = &self.transport;
        stream::iter(self.directory.list())
            .map(|peer| async move {
                let result = transport.fetch_chain(&peer).await;
                (peer, result)
            })
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await
    }
}
