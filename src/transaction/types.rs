/// Transaction types for the HYBRID ledger
use crate::crypto::{Address, Sha256Hash};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Maximum memo length in bytes
pub const MAX_MEMO_LENGTH: usize = 256;

/// Gas charged for every transaction regardless of payload.
pub const BASE_GAS: i64 = 21_000;

/// Gas charged per byte of payload data.
pub const GAS_PER_PAYLOAD_BYTE: i64 = 68;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOption {
    Yes,
    No,
    Abstain,
    NoWithVeto,
}

impl VoteOption {
    fn tag(&self) -> u8 {
        match self {
            VoteOption::Yes => 1,
            VoteOption::No => 2,
            VoteOption::Abstain => 3,
            VoteOption::NoWithVeto => 4,
        }
    }
}

/// What a transaction does. Each variant carries only the fields its kind needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Transfer,
    Stake {
        validator: Address,
    },
    Unstake {
        validator: Address,
    },
    Mint {
        token_id: String,
        #[serde(default)]
        metadata_uri: Option<String>,
    },
    NftTransfer {
        token_id: String,
    },
    ContractCall {
        contract: Address,
        method: String,
        #[serde(default)]
        input: Vec<u8>,
    },
    Bridge {
        destination_chain: String,
        destination_address: String,
    },
    Governance {
        proposal_id: u64,
        vote: VoteOption,
    },
}

/// Payload discriminant, used for pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Transfer,
    Stake,
    Unstake,
    NftMint,
    NftTransfer,
    ContractCall,
    Bridge,
    Governance,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Transfer => "transfer",
            PayloadKind::Stake => "stake",
            PayloadKind::Unstake => "unstake",
            PayloadKind::NftMint => "nft_mint",
            PayloadKind::NftTransfer => "nft_transfer",
            PayloadKind::ContractCall => "contract_call",
            PayloadKind::Bridge => "bridge",
            PayloadKind::Governance => "governance",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn update_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Transfer => PayloadKind::Transfer,
            Payload::Stake { .. } => PayloadKind::Stake,
            Payload::Unstake { .. } => PayloadKind::Unstake,
            Payload::Mint { .. } => PayloadKind::NftMint,
            Payload::NftTransfer { .. } => PayloadKind::NftTransfer,
            Payload::ContractCall { .. } => PayloadKind::ContractCall,
            Payload::Bridge { .. } => PayloadKind::Bridge,
            Payload::Governance { .. } => PayloadKind::Governance,
        }
    }

    /// Number of payload data bytes, the basis of the default gas estimate.
    pub fn data_len(&self) -> usize {
        match self {
            Payload::Transfer => 0,
            Payload::Stake { .. } | Payload::Unstake { .. } => 32,
            Payload::Mint {
                token_id,
                metadata_uri,
            } => token_id.len() + metadata_uri.as_ref().map_or(0, |u| u.len()),
            Payload::NftTransfer { token_id } => token_id.len(),
            Payload::ContractCall {
                method, input, ..
            } => 32 + method.len() + input.len(),
            Payload::Bridge {
                destination_chain,
                destination_address,
            } => destination_chain.len() + destination_address.len(),
            Payload::Governance { .. } => 9,
        }
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(self.kind().as_str().as_bytes());
        match self {
            Payload::Transfer => {}
            Payload::Stake { validator } | Payload::Unstake { validator } => {
                hasher.update(validator);
            }
            Payload::Mint {
                token_id,
                metadata_uri,
            } => {
                update_bytes(hasher, token_id.as_bytes());
                match metadata_uri {
                    Some(uri) => {
                        hasher.update([1u8]);
                        update_bytes(hasher, uri.as_bytes());
                    }
                    None => hasher.update([0u8]),
                }
            }
            Payload::NftTransfer { token_id } => update_bytes(hasher, token_id.as_bytes()),
            Payload::ContractCall {
                contract,
                method,
                input,
            } => {
                hasher.update(contract);
                update_bytes(hasher, method.as_bytes());
                update_bytes(hasher, input);
            }
            Payload::Bridge {
                destination_chain,
                destination_address,
            } => {
                update_bytes(hasher, destination_chain.as_bytes());
                update_bytes(hasher, destination_address.as_bytes());
            }
            Payload::Governance { proposal_id, vote } => {
                hasher.update(proposal_id.to_le_bytes());
                hasher.update([vote.tag()]);
            }
        }
    }
}

/// The hashed content of a transaction. Build one, then `seal` it.
///
/// Amount, fee and gas fields are signed so that malformed client input
/// survives decoding and is rejected at admission with a precise reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub sender: Address,
    pub recipient: Address,
    pub amount: i64,
    pub fee: i64,
    pub gas_limit: i64,
    pub gas_price: i64,
    pub nonce: u64,
    pub payload: Payload,
    pub timestamp: u64,
    #[serde(default)]
    pub memo: Option<String>,
}

impl TxBody {
    /// Creates a body with the default gas estimate:
    /// `gas_limit = 21000 + 68 * payload bytes`, `gas_price = max(1, fee / gas_limit)`.
    pub fn new(
        sender: Address,
        recipient: Address,
        amount: i64,
        fee: i64,
        nonce: u64,
        payload: Payload,
        timestamp: u64,
    ) -> Self {
        let gas_limit = BASE_GAS + GAS_PER_PAYLOAD_BYTE * payload.data_len() as i64;
        let gas_price = (fee / gas_limit).max(1);
        TxBody {
            sender,
            recipient,
            amount,
            fee,
            gas_limit,
            gas_price,
            nonce,
            payload,
            timestamp,
            memo: None,
        }
    }

    pub fn with_gas(mut self, gas_limit: i64, gas_price: i64) -> Self {
        self.gas_limit = gas_limit;
        self.gas_price = gas_price;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Content hash over every field.
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(b"hybrid-tx");
        hasher.update(self.sender);
        hasher.update(self.recipient);
        hasher.update(self.amount.to_le_bytes());
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.gas_limit.to_le_bytes());
        hasher.update(self.gas_price.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        self.payload.hash_into(&mut hasher);
        hasher.update(self.timestamp.to_le_bytes());
        match &self.memo {
            Some(memo) => {
                hasher.update([1u8]);
                update_bytes(&mut hasher, memo.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.finalize().into()
    }

    pub fn seal(self) -> Transaction {
        Transaction::new(self)
    }
}

/// An immutable transaction: a body, its content hash and a signature placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    hash: Sha256Hash,
    body: TxBody,
    #[serde(default)]
    signature: Option<Vec<u8>>,
}

impl Transaction {
    pub fn new(body: TxBody) -> Self {
        Transaction {
            hash: body.hash(),
            body,
            signature: None,
        }
    }

    /// Attaches an opaque signature. The signature is not part of the hash.
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn hash(&self) -> Sha256Hash {
        self.hash
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    /// True when the declared hash matches the body.
    pub fn verify_hash(&self) -> bool {
        self.body.hash() == self.hash
    }

    pub fn body(&self) -> &TxBody {
        &self.body
    }

    pub fn sender(&self) -> &Address {
        &self.body.sender
    }

    pub fn recipient(&self) -> &Address {
        &self.body.recipient
    }

    pub fn amount(&self) -> i64 {
        self.body.amount
    }

    pub fn fee(&self) -> i64 {
        self.body.fee
    }

    pub fn gas_limit(&self) -> i64 {
        self.body.gas_limit
    }

    pub fn gas_price(&self) -> i64 {
        self.body.gas_price
    }

    pub fn nonce(&self) -> u64 {
        self.body.nonce
    }

    pub fn payload(&self) -> &Payload {
        &self.body.payload
    }

    pub fn kind(&self) -> PayloadKind {
        self.body.payload.kind()
    }

    pub fn timestamp(&self) -> u64 {
        self.body.timestamp
    }

    pub fn memo(&self) -> Option<&str> {
        self.body.memo.as_deref()
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// Gas limit as block gas units. Admitted transactions always have a positive limit.
    pub fn gas_units(&self) -> u64 {
        self.body.gas_limit.max(0) as u64
    }
}
