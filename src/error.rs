//! Error types for FileChain

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// A submission or request body was malformed. The message is returned
    /// to the client verbatim.
    #[error("{0}")]
    Validation(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Proof-of-work not found within {attempts} attempts")]
    MiningBoundExceeded { attempts: u64 },

    #[error("Mining was cancelled")]
    MiningCancelled,

    #[error("Chain tip moved while the candidate block was being mined")]
    StaleCandidate,

    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("Peer {peer} returned an invalid response: {reason}")]
    InvalidPeerResponse { peer: String, reason: String },

    #[error("{0}")]
    InvalidPeer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ChainError::Validation(msg.into())
    }

    /// Peer failures never reach the caller of submit/mine/resolve; they are
    /// recorded per peer and skipped.
    pub fn is_peer_failure(&self) -> bool {
        matches!(
            self,
            ChainError::PeerUnreachable { .. } | ChainError::InvalidPeerResponse { .. }
        )
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Internal(format!("JSON error: {}", err))
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
