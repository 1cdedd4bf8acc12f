use crate::blockchain::core::chain::Block;
use crate::error::ChainError;

/// True iff `candidate` directly extends `previous`: consecutive index,
/// matching linkage, and a stored hash equal to its recomputed digest.
pub fn is_valid_successor(candidate: &Block, previous: &Block) -> bool {
    check_successor(candidate, previous).is_ok()
}

/// Same check as [`is_valid_successor`], naming the first failing rule.
pub fn check_successor(candidate: &Block, previous: &Block) -> Result<(), ChainError> {
    let expected = previous.index.checked_add(1).ok_or_else(|| {
        ChainError::InvalidBlock(format!("Block index {} cannot be extended.", previous.index))
    })?;
    if candidate.index != expected {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid block index. Expected {}, but got {}.",
            expected, candidate.index
        )));
    }

    if candidate.previous_hash != previous.hash {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid previous block hash. Expected {}, but got {}.",
            previous.hash, candidate.previous_hash
        )));
    }

    if !candidate.has_valid_hash() {
        return Err(ChainError::InvalidBlock(format!(
            "Stored hash {} does not match block contents.",
            candidate.hash
        )));
    }

    Ok(())
}

/// Validity check applied to chains received from peers.
///
/// Only linkage and per-block hash integrity are checked. Proof-of-work
/// difficulty, index continuity and genesis shape are NOT re-checked on
/// externally supplied chains.
pub fn is_valid_chain(blocks: &[Block]) -> bool {
    check_chain(blocks).is_ok()
}

pub fn check_chain(blocks: &[Block]) -> Result<(), ChainError> {
    for (position, block) in blocks.iter().enumerate() {
        if !block.has_valid_hash() {
            return Err(ChainError::InvalidBlock(format!(
                "Block at position {} has a hash that does not match its contents.",
                position
            )));
        }
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        if pair[1].previous_hash != pair[0].hash {
            return Err(ChainError::InvalidBlock(format!(
                "Block at position {} does not link to its predecessor.",
                position + 1
            )));
        }
    }

    Ok(())
}
