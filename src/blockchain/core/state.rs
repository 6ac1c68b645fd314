use super::chain::Block;
use crate::crypto::Sha256Hash;
use serde::Serialize;
use std::collections::HashMap;

/// Where the chain tip stands. There is no path back to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TipState {
    Uninitialized,
    HasTip { height: u64, hash: Sha256Hash },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub total_gas_used: u64,
    pub latest_height: Option<u64>,
}

/// Append-only store of accepted blocks.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    blocks: Vec<Block>,
    by_hash: HashMap<Sha256Hash, usize>,
    total_transactions: u64,
    total_gas_used: u64,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block that has already passed validation.
    pub(crate) fn append(&mut self, block: Block) {
        self.total_transactions += block.transactions.len() as u64;
        self.total_gas_used = self.total_gas_used.saturating_add(block.header.gas_used);
        self.by_hash.insert(block.hash(), self.blocks.len());
        self.blocks.push(block);
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn tip_state(&self) -> TipState {
        match self.tip() {
            Some(block) => TipState::HasTip {
                height: block.height(),
                hash: block.hash(),
            },
            None => TipState::Uninitialized,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get_block_by_height(&self, height: u64) -> Option<&Block> {
        let base = self.blocks.first()?.height();
        let index = height.checked_sub(base)?;
        self.blocks.get(usize::try_from(index).ok()?)
    }

    pub fn get_block_by_hash(&self, hash: &Sha256Hash) -> Option<&Block> {
        self.by_hash.get(hash).and_then(|&i| self.blocks.get(i))
    }

    pub fn get_latest_block(&self) -> Option<&Block> {
        self.tip()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            total_blocks: self.blocks.len() as u64,
            total_transactions: self.total_transactions,
            total_gas_used: self.total_gas_used,
            latest_height: self.tip().map(|b| b.height()),
        }
    }
}
