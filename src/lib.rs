//! HYBRID ledger core - mempool, block assembly and validator set for a
//! node-local proof-of-stake ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, chain state, validation and the block assembler
//! - [`transaction`] - Transaction types and stateless validation
//! - [`mempool`] - Fee-prioritised transaction pool
//!
//! ## Consensus
//! - [`consensus`] - Validator registry, delegations and proposer rotation
//!
//! ## Primitives
//! - [`crypto`] - Hashes, addresses and placeholder signatures
//! - [`clock`] - Injectable time source
//!
//! ## Node
//! - [`node`] - `LedgerCore`, the shared owner of pool, chain and registry
//! - [`persistence`] - Commit hooks and the block journal
//! - [`api`] - REST API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus
// ============================================================================
pub mod consensus;

// ============================================================================
// Primitives
// ============================================================================
pub mod clock;
pub mod crypto;

// ============================================================================
// Node
// ============================================================================
pub mod node;
pub mod persistence;

#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
