//! Error types for the HYBRID ledger core

use std::fmt;
use thiserror::Error;

/// Why the mempool refused to admit a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("amount cannot be negative (got {0})")]
    NegativeAmount(i64),
    #[error("fee cannot be negative (got {0})")]
    NegativeFee(i64),
    #[error("gas limit must be positive (got {0})")]
    NonPositiveGasLimit(i64),
    #[error("gas price must be positive (got {0})")]
    NonPositiveGasPrice(i64),
    #[error("sender address is missing")]
    MissingSender,
    #[error("recipient address is missing")]
    MissingRecipient,
    #[error("declared hash {declared} does not match content hash {computed}")]
    HashMismatch { declared: String, computed: String },
    #[error("memo is {len} bytes (max {max})")]
    MemoTooLong { len: usize, max: usize },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("transaction is {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("transaction {0} is already pending")]
    Duplicate(String),
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },
    #[error("pool is full ({capacity} entries) and only holds the sender's earlier nonces")]
    PoolFull { capacity: usize },
}

/// Why a block failed validation against the chain tip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockValidationError {
    #[error("no chain tip to validate against")]
    NoChainTip,
    #[error("height mismatch: expected {expected}, got {got}")]
    HeightMismatch { expected: u64, got: u64 },
    #[error("parent hash mismatch: expected {expected}, got {got}")]
    ParentHashMismatch { expected: String, got: String },
    #[error("header declares {declared} transactions but block carries {actual}")]
    TransactionCountMismatch { declared: u64, actual: u64 },
    #[error("transaction {0} does not hash to its declared hash")]
    TransactionHashMismatch(String),
    #[error("merkle root mismatch: expected {expected}, got {got}")]
    MerkleRootMismatch { expected: String, got: String },
    #[error("gas used mismatch: header says {declared}, transactions sum to {actual}")]
    GasUsedMismatch { declared: u64, actual: u64 },
    #[error("gas used {gas_used} exceeds gas limit {gas_limit}")]
    GasLimitExceeded { gas_used: u64, gas_limit: u64 },
    #[error("block hash mismatch: expected {expected}, got {got}")]
    BlockHashMismatch { expected: String, got: String },
}

/// Failures of validator administration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("validator {0} is already registered")]
    AlreadyRegistered(String),
    #[error("unknown validator {0}")]
    UnknownValidator(String),
    #[error("invalid commission: {0}")]
    InvalidCommission(String),
    #[error("delegation amount must be positive")]
    ZeroAmount,
    #[error("insufficient delegation: holds {held}, requested {requested}")]
    InsufficientDelegation { held: u64, requested: u64 },
    #[error("validator {0} is not jailed")]
    NotJailed(String),
    #[error("validator {validator} is jailed until {until}")]
    StillJailed { validator: String, until: u64 },
    #[error("validator {validator} cannot {action} while {status}")]
    InvalidTransition {
        validator: String,
        action: &'static str,
        status: String,
    },
}

#[derive(Debug, Clone)]
pub enum ChainError {
    Admission(RejectReason),
    InvalidBlock(BlockValidationError),
    Registry(RegistryError),
    ChainNotInitialized,
    GenesisAlreadySeeded,
    CommitHookFailed(String),
    ConfigError(String),
    IoError(String),
    SerializationError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::Admission(reason) => write!(f, "Transaction rejected: {}", reason),
            ChainError::InvalidBlock(reason) => write!(f, "Invalid block: {}", reason),
            ChainError::Registry(err) => write!(f, "Validator registry error: {}", err),
            ChainError::ChainNotInitialized => write!(f, "Chain has no genesis block"),
            ChainError::GenesisAlreadySeeded => write!(f, "Genesis block already seeded"),
            ChainError::CommitHookFailed(msg) => write!(f, "Commit hook failed: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<RejectReason> for ChainError {
    fn from(reason: RejectReason) -> Self {
        ChainError::Admission(reason)
    }
}

impl From<BlockValidationError> for ChainError {
    fn from(err: BlockValidationError) -> Self {
        ChainError::InvalidBlock(err)
    }
}

impl From<RegistryError> for ChainError {
    fn from(err: RegistryError) -> Self {
        ChainError::Registry(err)
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}
