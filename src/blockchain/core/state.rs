use crate::error::ChainError;
use crate::miner::{mine_block, MiningBound};
use crate::transaction::TransactionRecord;
use std::sync::atomic::AtomicBool;
use tracing::info;

use super::chain::Block;
use super::validation::{check_chain, check_successor};

/// Result of a mining request.
#[derive(Debug, Clone, PartialEq)]
pub enum MineOutcome {
    /// Pending pool was empty; nothing was produced.
    NoPending { pending_count: usize },
    Mined(Block),
}

/// The chain plus the pending-transaction pool.
///
/// Invariants: the chain is never empty, `chain[0]` is genesis,
/// `chain[i].index == i`, and each block links to its predecessor's hash.
/// Callers share it behind a single lock so mining and chain replacement
/// never interleave with submissions.
#[derive(Debug, Clone)]
pub struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<TransactionRecord>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerState {
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
            pending: Vec::new(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[TransactionRecord] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false; the chain holds at least the genesis block.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        // chain is constructed with genesis and only ever replaced by longer chains
        &self.chain[self.chain.len() - 1]
    }

    /// Index the next mined block will carry. Adopted peer chains are not
    /// index-checked, so the tip may sit at `u64::MAX`.
    pub fn next_index(&self) -> Result<u64, ChainError> {
        let last = self.last_block();
        last.index.checked_add(1).ok_or_else(|| {
            ChainError::InvalidBlock(format!("Block index {} cannot be extended.", last.index))
        })
    }

    /// Appends a record to the pending pool and returns the index of the
    /// block it is expected to land in.
    pub fn submit(&mut self, record: TransactionRecord) -> Result<u64, ChainError> {
        record.validate()?;
        let block_index = self.next_index()?;
        self.pending.push(record);
        Ok(block_index)
    }

    /// Builds the next candidate block from a snapshot of the pending pool,
    /// or `None` if there is nothing to mine.
    pub fn prepare_candidate(&self) -> Result<Option<Block>, ChainError> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let index = self.next_index()?;
        let previous_hash = self.last_block().hash.clone();
        Ok(Some(Block::new(index, self.pending.clone(), previous_hash)))
    }

    /// Appends a mined block and drains the `included` records it was built
    /// from. Records submitted after the snapshot stay pending.
    pub fn commit_mined(&mut self, block: Block, included: usize) -> Result<(), ChainError> {
        if block.previous_hash != self.last_block().hash {
            return Err(ChainError::StaleCandidate);
        }
        check_successor(&block, self.last_block())?;
        if !block.meets_difficulty() {
            return Err(ChainError::InvalidBlock(
                "Block hash does not meet the difficulty prefix.".to_string(),
            ));
        }
        if included > self.pending.len() || block.transactions[..] != self.pending[..included] {
            return Err(ChainError::InvalidBlock(
                "Block transactions do not match the pending pool.".to_string(),
            ));
        }

        self.chain.push(block);
        self.pending.drain(..included);
        Ok(())
    }

    /// Mines the whole pending pool while holding `&mut self`.
    ///
    /// On error neither the chain nor the pending pool is changed.
    pub fn mine(
        &mut self,
        bound: &MiningBound,
        cancel: &AtomicBool,
    ) -> Result<MineOutcome, ChainError> {
        let candidate = match self.prepare_candidate()? {
            Some(candidate) => candidate,
            None => {
                info!("No pending transactions to mine");
                return Ok(MineOutcome::NoPending {
                    pending_count: self.pending.len(),
                });
            }
        };
        let included = candidate.transactions.len();
        let mined = mine_block(candidate, bound, cancel)?;
        self.commit_mined(mined.clone(), included)?;
        info!(index = mined.index, nonce = mined.nonce, "Mined block #{}", mined.index);
        Ok(MineOutcome::Mined(mined))
    }

    /// Validates and appends a single block received from elsewhere.
    pub fn add_block(&mut self, block: Block) -> Result<(), ChainError> {
        check_successor(&block, self.last_block())?;
        self.chain.push(block);
        Ok(())
    }

    /// Replaces the chain wholesale if `candidate` is strictly longer and
    /// passes chain validation. The pending pool is left untouched, and
    /// transactions only present in the discarded chain are not recovered.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<bool, ChainError> {
        if candidate.len() <= self.chain.len() {
            return Ok(false);
        }
        check_chain(&candidate)?;
        self.chain = candidate;
        Ok(true)
    }
}
