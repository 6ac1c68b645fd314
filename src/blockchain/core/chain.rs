use crate::crypto::{placeholder_signature, Address, Sha256Hash};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Merkle root of a block without transactions.
pub const EMPTY_MERKLE_ROOT: Sha256Hash = [0u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: Sha256Hash,
    pub parent_hash: Sha256Hash,
    pub merkle_root: Sha256Hash,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub proposer: Address,
    pub signature: Sha256Hash,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub transactions_count: u64,
}

impl BlockHeader {
    /// Hash over every header field except `hash` and `signature`.
    pub fn compute_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(b"hybrid-block");
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.parent_hash);
        hasher.update(self.merkle_root);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.proposer);
        hasher.update(self.gas_limit.to_le_bytes());
        hasher.update(self.gas_used.to_le_bytes());
        hasher.update(self.transactions_count.to_le_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assembles a block on top of `parent_hash`, filling in the derived
    /// header fields (merkle root, gas used, count, hash, signature).
    pub fn build(
        height: u64,
        parent_hash: Sha256Hash,
        timestamp: u64,
        proposer: Address,
        gas_limit: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut header = BlockHeader {
            height,
            hash: [0u8; 32],
            parent_hash,
            merkle_root: Block::calculate_merkle_root(&transactions),
            timestamp,
            proposer,
            signature: [0u8; 32],
            gas_limit,
            gas_used: Block::total_gas(&transactions),
            transactions_count: transactions.len() as u64,
        };
        header.hash = header.compute_hash();
        header.signature = placeholder_signature(&header.hash, &proposer, timestamp);

        Block {
            header,
            transactions,
        }
    }

    /// Height-0 block with a zero parent hash and no transactions.
    pub fn genesis(timestamp: u64, proposer: Address, gas_limit: u64) -> Self {
        Block::build(0, [0u8; 32], timestamp, proposer, gas_limit, Vec::new())
    }

    pub fn hash(&self) -> Sha256Hash {
        self.header.hash
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.header.hash)
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn transaction_hashes(&self) -> Vec<Sha256Hash> {
        self.transactions.iter().map(|tx| tx.hash()).collect()
    }

    pub fn total_gas(transactions: &[Transaction]) -> u64 {
        transactions
            .iter()
            .fold(0u64, |acc, tx| acc.saturating_add(tx.gas_units()))
    }

    /// Binary merkle tree over the ordered transaction hashes. A lone leaf
    /// is its own root and an odd level pairs its last node with itself.
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Sha256Hash {
        if transactions.is_empty() {
            return EMPTY_MERKLE_ROOT;
        }

        let mut level: Vec<Sha256Hash> = transactions.iter().map(|tx| tx.hash()).collect();
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    let mut hasher = Sha256::new();
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().into()
                })
                .collect();
        }
        level[0]
    }
}
