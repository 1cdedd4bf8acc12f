//! Proof-of-work mining
//!
//! The nonce search is bounded by an attempt count and an optional
//! wall-clock budget, and polls a cancel flag so an abandoned request stops
//! burning CPU. [`mine_shared`] is the form used by the API: it snapshots the
//! candidate under the ledger lock, searches with the lock released, and
//! commits under the lock.

use crate::blockchain::{Block, LedgerState, MineOutcome, DIFFICULTY_PREFIX};
use crate::error::ChainError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// How often (in attempts) the deadline and cancel flag are polled.
const POLL_INTERVAL: u64 = 1024;

/// Times a candidate is rebuilt when the chain tip moves underneath it.
pub const MAX_STALE_RETRIES: usize = 3;

pub type SharedLedger = Arc<RwLock<LedgerState>>;

/// Upper bounds on a single nonce search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningBound {
    pub max_attempts: u64,
    pub max_duration: Option<Duration>,
}

impl Default for MiningBound {
    fn default() -> Self {
        Self {
            max_attempts: 50_000_000,
            max_duration: Some(Duration::from_secs(60)),
        }
    }
}

impl MiningBound {
    pub fn attempts(max_attempts: u64) -> Self {
        Self {
            max_attempts,
            max_duration: None,
        }
    }
}

/// Searches for a nonce whose hash meets the fixed difficulty.
pub fn mine_block(
    block: Block,
    bound: &MiningBound,
    cancel: &AtomicBool,
) -> Result<Block, ChainError> {
    search_nonce(block, DIFFICULTY_PREFIX, bound, cancel)
}

/// Nonce search against an arbitrary prefix. The candidate's timestamp is
/// left untouched; only the nonce varies.
pub(crate) fn search_nonce(
    mut block: Block,
    prefix: &str,
    bound: &MiningBound,
    cancel: &AtomicBool,
) -> Result<Block, ChainError> {
    let started = Instant::now();
    let mut attempts: u64 = 0;

    loop {
        if block.hash.starts_with(prefix) {
            debug!(index = block.index, nonce = block.nonce, attempts, "pow.found");
            return Ok(block);
        }

        if attempts >= bound.max_attempts {
            return Err(ChainError::MiningBoundExceeded { attempts });
        }

        if attempts % POLL_INTERVAL == 0 {
            if cancel.load(Ordering::Relaxed) {
                return Err(ChainError::MiningCancelled);
            }
            if let Some(limit) = bound.max_duration {
                if started.elapsed() >= limit {
                    return Err(ChainError::MiningBoundExceeded { attempts });
                }
            }
        }

        let next = block
            .nonce
            .checked_add(1)
            .ok_or(ChainError::MiningBoundExceeded { attempts })?;
        block.set_nonce(next);
        attempts += 1;
    }
}

/// Sets the shared cancel flag when dropped, so dropping the future that
/// owns it stops the blocking search.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Mines the pending pool of a shared ledger.
///
/// `gate` serialises concurrent callers; the ledger lock itself is only held
/// while snapshotting and while committing.
pub async fn mine_shared(
    ledger: &SharedLedger,
    gate: &Mutex<()>,
    bound: &MiningBound,
) -> Result<MineOutcome, ChainError> {
    let _gate = gate.lock().await;

    for _ in 0..=MAX_STALE_RETRIES {
        let (candidate, included) = {
            let state = ledger.read().await;
            match state.prepare_candidate()? {
                Some(candidate) => {
                    let included = candidate.transactions.len();
                    (candidate, included)
                }
                None => {
                    return Ok(MineOutcome::NoPending {
                        pending_count: state.pending().len(),
                    })
                }
            }
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let guard = CancelOnDrop(cancel.clone());
        let search_bound = *bound;
        let search = move || mine_block(candidate, &search_bound, &cancel);
        let mined = tokio::task::spawn_blocking(search)
            .await
            .map_err(|e| ChainError::Internal(format!("mining task failed: {}", e)))??;
        // Search is over; the flag no longer matters.
        drop(guard);

        let mut state = ledger.write().await;
        match state.commit_mined(mined.clone(), included) {
            Ok(()) => {
                info!(
                    index = mined.index,
                    nonce = mined.nonce,
                    transactions = included,
                    hash = %mined.hash,
                    "Mined block #{}",
                    mined.index
                );
                return Ok(MineOutcome::Mined(mined));
            }
            Err(ChainError::StaleCandidate) => {
                warn!(index = mined.index, "chain tip moved during mining; rebuilding candidate");
                continue;
            }
            Err(e) => return Err(e),
        }
    }

    Err(ChainError::StaleCandidate)
}
