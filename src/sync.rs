//! Chain synchronization for FileChain
//!
//! Implements the longest-valid-chain rule: every peer's chain is fetched
//! and validated without holding the ledger lock, and the local chain is
//! swapped under the write lock only at the decision point.

use crate::blockchain::{check_chain, Block};
use crate::error::ChainError;
use crate::miner::SharedLedger;
use crate::network::NetworkNode;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a resolution pass decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Replaced,
    Authoritative,
}

impl ResolveOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ResolveOutcome::Replaced => "Chain replaced",
            ResolveOutcome::Authoritative => "Chain is authoritative",
        }
    }
}

/// How one peer's chain was judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerChainStatus {
    /// Valid and longer than the local chain at the start of the pass.
    Longer { length: usize },
    NotLonger { length: usize },
    Invalid(String),
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerChainReport {
    pub peer: String,
    pub status: PeerChainStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveReport {
    pub outcome: ResolveOutcome,
    /// Local chain length after the pass.
    pub length: usize,
    pub peers: Vec<PeerChainReport>,
}

/// Consensus over the peer directory.
#[derive(Clone)]
pub struct ChainResolver {
    ledger: SharedLedger,
    network: Arc<NetworkNode>,
}

impl ChainResolver {
    pub fn new(ledger: SharedLedger, network: Arc<NetworkNode>) -> Self {
        Self { ledger, network }
    }

    /// One resolution pass. Peer failures are recorded and skipped, never
    /// returned; the local chain only ever grows.
    pub async fn resolve(&self) -> ResolveReport {
        let local_length = self.ledger.read().await.len();
        let responses = self.network.fetch_chains().await;

        let mut best: Option<(String, Vec<Block>)> = None;
        let mut best_length = local_length;
        let mut peers = Vec::with_capacity(responses.len());

        for (peer, result) in responses {
            let status = match result {
                Err(ChainError::PeerUnreachable { reason, .. }) => {
                    warn!(peer = %peer, reason = %reason, "peer unreachable during resolve");
                    PeerChainStatus::Unreachable(reason)
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "peer returned an unusable chain");
                    PeerChainStatus::Invalid(e.to_string())
                }
                Ok(snapshot) => {
                    let length = snapshot.chain.len();
                    if snapshot.length != length {
                        PeerChainStatus::Invalid(format!(
                            "reported length {} but sent {} blocks",
                            snapshot.length, length
                        ))
                    } else if length <= local_length {
                        PeerChainStatus::NotLonger { length }
                    } else if let Err(e) = check_chain(&snapshot.chain) {
                        warn!(peer = %peer, error = %e, "peer chain failed validation");
                        PeerChainStatus::Invalid(e.to_string())
                    } else {
                        if length > best_length {
                            best_length = length;
                            best = Some((peer.clone(), snapshot.chain));
                        }
                        PeerChainStatus::Longer { length }
                    }
                }
            };
            debug!(peer = %peer, status = ?status, "peer chain evaluated");
            peers.push(PeerChainReport { peer, status });
        }

        if !peers.is_empty()
            && peers
                .iter()
                .all(|p| matches!(p.status, PeerChainStatus::Unreachable(_)))
        {
            warn!(peers = peers.len(), "no peer reachable; keeping local chain");
        }

        let mut state = self.ledger.write().await;
        let outcome = match best {
            Some((peer, chain)) => match state.replace_chain(chain) {
                Ok(true) => {
                    info!(peer = %peer, length = state.len(), "Chain replaced");
                    ResolveOutcome::Replaced
                }
                Ok(false) => ResolveOutcome::Authoritative,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "candidate chain rejected at swap");
                    ResolveOutcome::Authoritative
                }
            },
            None => ResolveOutcome::Authoritative,
        };

        ResolveReport {
            outcome,
            length: state.len(),
            peers,
        }
    }
}
