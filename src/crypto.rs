//! Hashing primitives and address helpers for the HYBRID ledger
//!
//! Real signature cryptography lives outside this crate; blocks carry a
//! deterministic placeholder bound to (block hash, proposer, timestamp).

use crate::error::ChainError;
use sha2::{Digest, Sha256};

/// 32-byte SHA-256 digest.
pub type Sha256Hash = [u8; 32];

/// Type alias for an account or validator address, a 32-byte hash.
/// The all-zero address means "missing".
pub type Address = [u8; 32];

pub const EMPTY_ADDRESS: Address = [0u8; 32];

/// Convenience function to create an address from a string (hashes the string).
/// Useful for human-readable labels in configuration and tests.
pub fn address_from_string(s: &str) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hasher.finalize().into()
}

/// Convert an address to a hex string for display.
pub fn address_to_hex(addr: &Address) -> String {
    hex::encode(addr)
}

/// Convert a hex string to an address.
pub fn address_from_hex(hex_str: &str) -> Result<Address, ChainError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ChainError::ConfigError(format!("Invalid hex address: {}", e)))?;
    if bytes.len() != 32 {
        return Err(ChainError::ConfigError(format!(
            "Address must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    bytes
        .try_into()
        .map_err(|_| ChainError::ConfigError("Failed to convert bytes into address".to_string()))
}

/// Parse an address given either as 64 hex characters or as a label.
pub fn parse_address(s: &str) -> Result<Address, ChainError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ChainError::ConfigError("Address cannot be empty".to_string()));
    }
    if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        address_from_hex(trimmed)
    } else {
        Ok(address_from_string(trimmed))
    }
}

pub fn is_missing(addr: &Address) -> bool {
    *addr == EMPTY_ADDRESS
}

/// Placeholder block signature. Stands in for the proposer's signature over
/// the block hash until a signing collaborator is wired in.
pub fn placeholder_signature(block_hash: &Sha256Hash, proposer: &Address, timestamp: u64) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(b"hybrid-block-signature");
    hasher.update(block_hash);
    hasher.update(proposer);
    hasher.update(timestamp.to_le_bytes());
    hasher.finalize().into()
}
