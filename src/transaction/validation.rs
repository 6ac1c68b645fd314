/// Admission checks for transactions, separated from type definitions
use crate::crypto::is_missing;
use crate::error::RejectReason;
use crate::transaction::types::{
    Payload, Transaction, MAX_MEMO_LENGTH, MAX_TRANSACTION_SIZE,
};

impl Transaction {
    /// Checks that need nothing but the transaction itself: value and gas
    /// bounds, addresses, hash integrity, memo, payload shape and size.
    pub fn validate_stateless(&self) -> Result<(), RejectReason> {
        let body = self.body();

        if body.amount < 0 {
            return Err(RejectReason::NegativeAmount(body.amount));
        }
        if body.fee < 0 {
            return Err(RejectReason::NegativeFee(body.fee));
        }
        if body.gas_limit <= 0 {
            return Err(RejectReason::NonPositiveGasLimit(body.gas_limit));
        }
        if body.gas_price <= 0 {
            return Err(RejectReason::NonPositiveGasPrice(body.gas_price));
        }
        if is_missing(&body.sender) {
            return Err(RejectReason::MissingSender);
        }
        if is_missing(&body.recipient) {
            return Err(RejectReason::MissingRecipient);
        }

        let computed = body.hash();
        if computed != self.hash() {
            return Err(RejectReason::HashMismatch {
                declared: self.hash_str(),
                computed: hex::encode(computed),
            });
        }

        if let Some(memo) = &body.memo {
            if memo.len() > MAX_MEMO_LENGTH {
                return Err(RejectReason::MemoTooLong {
                    len: memo.len(),
                    max: MAX_MEMO_LENGTH,
                });
            }
        }

        body.payload.validate()?;
        self.validate_size()
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), RejectReason> {
        let size = bincode::serialized_size(self)
            .map_err(|e| RejectReason::MalformedPayload(format!("Serialization failed: {}", e)))?
            as usize;

        if size > MAX_TRANSACTION_SIZE {
            return Err(RejectReason::TooLarge {
                size,
                max: MAX_TRANSACTION_SIZE,
            });
        }
        Ok(())
    }
}

impl Payload {
    pub fn validate(&self) -> Result<(), RejectReason> {
        match self {
            Payload::Transfer | Payload::Governance { .. } => Ok(()),
            Payload::Stake { validator } | Payload::Unstake { validator } => {
                if is_missing(validator) {
                    return Err(RejectReason::MalformedPayload(
                        "stake payload needs a validator address".to_string(),
                    ));
                }
                Ok(())
            }
            Payload::Mint { token_id, .. } | Payload::NftTransfer { token_id } => {
                if token_id.trim().is_empty() {
                    return Err(RejectReason::MalformedPayload(
                        "token id cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
            Payload::ContractCall {
                contract, method, ..
            } => {
                if is_missing(contract) {
                    return Err(RejectReason::MalformedPayload(
                        "contract address is missing".to_string(),
                    ));
                }
                if method.trim().is_empty() {
                    return Err(RejectReason::MalformedPayload(
                        "contract method cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
            Payload::Bridge {
                destination_chain,
                destination_address,
            } => {
                if destination_chain.trim().is_empty() || destination_address.trim().is_empty() {
                    return Err(RejectReason::MalformedPayload(
                        "bridge destination is incomplete".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}
