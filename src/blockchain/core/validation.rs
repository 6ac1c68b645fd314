use super::chain::Block;
use crate::error::BlockValidationError;

/// Checks that need only the block: transaction count, transaction hashes,
/// merkle root, gas accounting and the block hash.
pub fn check_block_integrity(block: &Block) -> Result<(), BlockValidationError> {
    let header = &block.header;

    let actual = block.transactions.len() as u64;
    if header.transactions_count != actual {
        return Err(BlockValidationError::TransactionCountMismatch {
            declared: header.transactions_count,
            actual,
        });
    }

    if let Some(bad) = block.transactions.iter().find(|tx| !tx.verify_hash()) {
        return Err(BlockValidationError::TransactionHashMismatch(bad.hash_str()));
    }

    let merkle_root = Block::calculate_merkle_root(&block.transactions);
    if merkle_root != header.merkle_root {
        return Err(BlockValidationError::MerkleRootMismatch {
            expected: hex::encode(merkle_root),
            got: hex::encode(header.merkle_root),
        });
    }

    let gas_used = Block::total_gas(&block.transactions);
    if gas_used != header.gas_used {
        return Err(BlockValidationError::GasUsedMismatch {
            declared: header.gas_used,
            actual: gas_used,
        });
    }
    if header.gas_used > header.gas_limit {
        return Err(BlockValidationError::GasLimitExceeded {
            gas_used: header.gas_used,
            gas_limit: header.gas_limit,
        });
    }

    let hash = header.compute_hash();
    if hash != header.hash {
        return Err(BlockValidationError::BlockHashMismatch {
            expected: hex::encode(hash),
            got: hex::encode(header.hash),
        });
    }

    Ok(())
}

/// Full check of `block` as the successor of `tip`.
pub fn check_block(block: &Block, tip: Option<&Block>) -> Result<(), BlockValidationError> {
    let tip = tip.ok_or(BlockValidationError::NoChainTip)?;

    let expected = tip.height() + 1;
    if block.header.height != expected {
        return Err(BlockValidationError::HeightMismatch {
            expected,
            got: block.header.height,
        });
    }

    if block.header.parent_hash != tip.hash() {
        return Err(BlockValidationError::ParentHashMismatch {
            expected: tip.hash_str(),
            got: hex::encode(block.header.parent_hash),
        });
    }

    check_block_integrity(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address_from_string;
    use crate::transaction::{Payload, TxBody};

    fn child_of(tip: &Block) -> Block {
        let tx = TxBody::new(
            address_from_string("alice"),
            address_from_string("bob"),
            1,
            21_000,
            0,
            Payload::Transfer,
            0,
        )
        .seal();
        Block::build(
            tip.height() + 1,
            tip.hash(),
            10,
            address_from_string("val"),
            1_000_000,
            vec![tx],
        )
    }

    #[test]
    fn test_valid_child_passes() {
        let genesis = Block::genesis(0, address_from_string("val"), 1_000_000);
        assert_eq!(check_block(&child_of(&genesis), Some(&genesis)), Ok(()));
    }

    #[test]
    fn test_no_tip() {
        let genesis = Block::genesis(0, address_from_string("val"), 1_000_000);
        assert_eq!(
            check_block(&child_of(&genesis), None),
            Err(BlockValidationError::NoChainTip)
        );
    }

    #[test]
    fn test_linkage_failures() {
        let genesis = Block::genesis(0, address_from_string("val"), 1_000_000);

        let mut block = child_of(&genesis);
        block.header.height = 5;
        assert!(matches!(
            check_block(&block, Some(&genesis)),
            Err(BlockValidationError::HeightMismatch { expected: 1, got: 5 })
        ));

        let mut block = child_of(&genesis);
        block.header.parent_hash = [3u8; 32];
        assert!(matches!(
            check_block(&block, Some(&genesis)),
            Err(BlockValidationError::ParentHashMismatch { .. })
        ));
    }

    #[test]
    fn test_integrity_failures() {
        let genesis = Block::genesis(0, address_from_string("val"), 1_000_000);

        let mut block = child_of(&genesis);
        block.header.transactions_count = 2;
        assert!(matches!(
            check_block_integrity(&block),
            Err(BlockValidationError::TransactionCountMismatch { .. })
        ));

        let mut block = child_of(&genesis);
        block.header.merkle_root = [1u8; 32];
        assert!(matches!(
            check_block_integrity(&block),
            Err(BlockValidationError::MerkleRootMismatch { .. })
        ));

        let mut block = child_of(&genesis);
        block.header.gas_used += 1;
        assert!(matches!(
            check_block_integrity(&block),
            Err(BlockValidationError::GasUsedMismatch { .. })
        ));

        let mut block = child_of(&genesis);
        block.header.gas_limit = 100;
        assert!(matches!(
            check_block_integrity(&block),
            Err(BlockValidationError::GasLimitExceeded { .. })
        ));

        let mut block = child_of(&genesis);
        block.header.timestamp += 1;
        assert!(matches!(
            check_block_integrity(&block),
            Err(BlockValidationError::BlockHashMismatch { .. })
        ));
    }

    #[test]
    fn test_signature_change_still_valid() {
        let genesis = Block::genesis(0, address_from_string("val"), 1_000_000);
        let mut block = child_of(&genesis);
        block.header.signature = [0xAB; 32];
        assert!(check_block(&block, Some(&genesis)).is_ok());
    }
}
