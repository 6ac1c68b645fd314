use super::chain::Block;
use super::state::{ChainState, ChainStats};
use super::validation::{check_block, check_block_integrity};
use crate::clock::Clock;
use crate::consensus::ValidatorRegistry;
use crate::crypto::{address_from_string, address_to_hex, Address};
use crate::error::{BlockValidationError, ChainError};
use crate::mempool::TransactionPool;
use crate::persistence::CommitHook;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_BLOCK_TRANSACTIONS: usize = 1_000;
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 20_000_000;
pub const DEFAULT_LOCAL_VALIDATOR: &str = "hybridvaloper1local";

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub max_transactions: usize,
    pub block_gas_limit: u64,
    /// Proposer used when the active set is empty
    pub local_validator: Address,
    /// Only produce when the registry picks `local_validator`
    pub require_proposer_turn: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_transactions: DEFAULT_MAX_BLOCK_TRANSACTIONS,
            block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            local_validator: address_from_string(DEFAULT_LOCAL_VALIDATOR),
            require_proposer_turn: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProducerStats {
    pub blocks_produced: u64,
    pub blocks_imported: u64,
    pub total_gas_used: u64,
    pub validator: String,
    pub gas_limit: u64,
    pub max_transactions: usize,
}

/// Builds blocks from the pool, validates incoming ones and owns the chain.
pub struct BlockAssembler {
    config: AssemblerConfig,
    chain: ChainState,
    commit_hook: Option<Arc<dyn CommitHook>>,
    clock: Arc<dyn Clock>,
    blocks_produced: u64,
    blocks_imported: u64,
}

impl BlockAssembler {
    pub fn new(config: AssemblerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            chain: ChainState::new(),
            commit_hook: None,
            clock,
            blocks_produced: 0,
            blocks_imported: 0,
        }
    }

    pub fn with_commit_hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.commit_hook = Some(hook);
        self
    }

    pub fn set_commit_hook(&mut self, hook: Arc<dyn CommitHook>) {
        self.commit_hook = Some(hook);
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn chain(&self) -> &ChainState {
        &self.chain
    }

    /// Builds and commits the next block. Returns `None` when there is no
    /// tip yet, when it is not this node's turn, or when the commit hook
    /// fails; pool and chain are untouched in every `None` case. The
    /// proposer slot is consumed only by a committed block or by another
    /// validator's turn, so a failed commit retries with the same proposer.
    pub fn produce_block(
        &mut self,
        pool: &mut TransactionPool,
        registry: &mut ValidatorRegistry,
    ) -> Option<Block> {
        let Some(parent) = self.chain.tip() else {
            debug!("assembler.no_tip");
            return None;
        };
        let height = parent.height() + 1;
        let parent_hash = parent.hash();
        let parent_timestamp = parent.header.timestamp;

        let local = self.config.local_validator;
        let proposer = registry.peek_proposer().unwrap_or(local);
        if self.config.require_proposer_turn && proposer != local {
            debug!(height, proposer = %address_to_hex(&proposer), "assembler.not_our_turn");
            registry.advance_proposer();
            return None;
        }

        let transactions = pool.select_for_block(self.config.max_transactions, self.config.block_gas_limit);
        let timestamp = self.clock.now_millis().max(parent_timestamp);
        let block = Block::build(
            height,
            parent_hash,
            timestamp,
            proposer,
            self.config.block_gas_limit,
            transactions,
        );

        if let Err(e) = self.commit(&block) {
            warn!(height, error = %e, "assembler.commit_failed");
            return None;
        }
        registry.advance_proposer();
        pool.remove(&block.transaction_hashes());
        self.blocks_produced += 1;

        info!(
            height,
            hash = %block.hash_str(),
            transactions = block.transactions.len(),
            gas_used = block.header.gas_used,
            proposer = %address_to_hex(&proposer),
            "block.produced"
        );
        Some(block)
    }

    /// Checks `block` as the successor of the current tip.
    pub fn check_block(&self, block: &Block) -> Result<(), BlockValidationError> {
        check_block(block, self.chain.tip())
    }

    pub fn validate_block(&self, block: &Block) -> bool {
        match self.check_block(block) {
            Ok(()) => true,
            Err(e) => {
                debug!(height = block.height(), hash = %block.hash_str(), reason = %e, "block.rejected");
                false
            }
        }
    }

    /// Accepts an externally produced block on top of the tip and drops its
    /// transactions from the pool.
    pub fn import_block(&mut self, block: Block, pool: &mut TransactionPool) -> Result<(), ChainError> {
        self.check_block(&block)?;
        self.commit(&block)?;
        pool.remove(&block.transaction_hashes());
        self.blocks_imported += 1;
        info!(height = block.height(), hash = %block.hash_str(), "block.imported");
        Ok(())
    }

    /// Installs the first block of an empty chain.
    pub fn seed_genesis(&mut self, block: Block) -> Result<(), ChainError> {
        if !self.chain.is_empty() {
            return Err(ChainError::GenesisAlreadySeeded);
        }
        check_block_integrity(&block)?;
        self.commit(&block)?;
        info!(height = block.height(), hash = %block.hash_str(), "block.genesis");
        Ok(())
    }

    pub fn chain_stats(&self) -> ChainStats {
        self.chain.stats()
    }

    pub fn stats(&self) -> ProducerStats {
        ProducerStats {
            blocks_produced: self.blocks_produced,
            blocks_imported: self.blocks_imported,
            total_gas_used: self.chain.stats().total_gas_used,
            validator: address_to_hex(&self.config.local_validator),
            gas_limit: self.config.block_gas_limit,
            max_transactions: self.config.max_transactions,
        }
    }

    fn commit(&mut self, block: &Block) -> Result<(), ChainError> {
        if let Some(hook) = &self.commit_hook {
            hook.on_commit(block)
                .map_err(|e| ChainError::CommitHookFailed(e.to_string()))?;
        }
        self.chain.append(block.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::consensus::RegistryConfig;
    use crate::persistence::InMemoryJournal;
    use crate::transaction::{Payload, Transaction, TxBody};
    use std::time::Duration;

    struct FailingHook;

    impl CommitHook for FailingHook {
        fn on_commit(&self, _block: &Block) -> Result<(), ChainError> {
            Err(ChainError::IoError("disk full".to_string()))
        }
    }

    struct Fixture {
        assembler: BlockAssembler,
        pool: TransactionPool,
        registry: ValidatorRegistry,
        clock: Arc<ManualClock>,
    }

    fn fixture(config: AssemblerConfig) -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut assembler = BlockAssembler::new(config, clock.clone());
        assembler
            .seed_genesis(Block::genesis(1_000_000, [0xAA; 32], DEFAULT_BLOCK_GAS_LIMIT))
            .unwrap();
        Fixture {
            assembler,
            pool: TransactionPool::new(100, 100, clock.clone()),
            registry: ValidatorRegistry::new(RegistryConfig::default(), clock.clone()),
            clock,
        }
    }

    fn tx(sender: &str, nonce: u64) -> Transaction {
        TxBody::new(
            address_from_string(sender),
            address_from_string("bob"),
            5,
            42_000,
            nonce,
            Payload::Transfer,
            0,
        )
        .seal()
    }

    #[test]
    fn test_produce_without_tip_returns_none() {
        let clock = Arc::new(ManualClock::new(0));
        let mut assembler = BlockAssembler::new(AssemblerConfig::default(), clock.clone());
        let mut pool = TransactionPool::new(10, 10, clock.clone());
        let mut registry = ValidatorRegistry::new(RegistryConfig::default(), clock);
        assert!(assembler.produce_block(&mut pool, &mut registry).is_none());
    }

    #[test]
    fn test_produce_includes_and_removes_transactions() {
        let mut f = fixture(AssemblerConfig::default());
        f.pool.submit(tx("alice", 0)).unwrap();
        f.pool.submit(tx("carol", 0)).unwrap();
        f.clock.advance(Duration::from_secs(6));

        let block = f.assembler.produce_block(&mut f.pool, &mut f.registry).unwrap();
        assert_eq!(block.height(), 1);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.header.gas_used, 42_000);
        assert_eq!(block.header.timestamp, 1_006_000);
        assert_eq!(block.header.proposer, address_from_string(DEFAULT_LOCAL_VALIDATOR));
        assert!(f.pool.is_empty());
        assert_eq!(f.assembler.chain().get_latest_block(), Some(&block));
        assert_eq!(f.assembler.stats().blocks_produced, 1);

        // The included transactions remain visible through the recent cache
        assert!(f.pool.get(&block.transactions[0].hash()).is_some());
    }

    #[test]
    fn test_empty_block_still_produced() {
        let mut f = fixture(AssemblerConfig::default());
        let block = f.assembler.produce_block(&mut f.pool, &mut f.registry).unwrap();
        assert!(block.transactions.is_empty());
        assert_eq!(block.header.merkle_root, crate::blockchain::EMPTY_MERKLE_ROOT);
    }

    #[test]
    fn test_produced_block_validates_on_peer() {
        let mut producer = fixture(AssemblerConfig::default());
        let peer = fixture(AssemblerConfig::default());
        producer.pool.submit(tx("alice", 0)).unwrap();

        let block = producer
            .assembler
            .produce_block(&mut producer.pool, &mut producer.registry)
            .unwrap();
        assert!(peer.assembler.validate_block(&block));

        let mut tampered = block.clone();
        tampered.header.gas_used += 1;
        assert!(!peer.assembler.validate_block(&tampered));

        let mut emptied = block;
        emptied.transactions.clear();
        assert!(!peer.assembler.validate_block(&emptied));
    }

    #[test]
    fn test_timestamp_never_goes_backwards() {
        let mut f = fixture(AssemblerConfig::default());
        f.clock.set(10);
        let block = f.assembler.produce_block(&mut f.pool, &mut f.registry).unwrap();
        assert_eq!(block.header.timestamp, 1_000_000);
    }

    #[test]
    fn test_commit_hook_failure_leaves_state_untouched() {
        let mut f = fixture(AssemblerConfig::default());
        f.assembler.set_commit_hook(Arc::new(FailingHook));
        f.pool.submit(tx("alice", 0)).unwrap();

        assert!(f.assembler.produce_block(&mut f.pool, &mut f.registry).is_none());
        assert_eq!(f.pool.len(), 1);
        assert_eq!(f.assembler.chain().len(), 1);
    }

    #[test]
    fn test_failed_commit_keeps_proposer_slot() {
        let mut f = fixture(AssemblerConfig::default());
        for label in ["v1", "v2"] {
            f.registry
                .register_genesis(
                    crate::consensus::ValidatorRegistration::new(
                        address_from_string(label),
                        vec![],
                        crate::consensus::Rate::ZERO,
                        1,
                    ),
                    1,
                )
                .unwrap();
        }
        let expected = f.registry.peek_proposer().unwrap();

        f.assembler.set_commit_hook(Arc::new(FailingHook));
        assert!(f.assembler.produce_block(&mut f.pool, &mut f.registry).is_none());
        assert_eq!(f.registry.peek_proposer(), Some(expected));

        f.assembler.set_commit_hook(Arc::new(InMemoryJournal::new()));
        let block = f.assembler.produce_block(&mut f.pool, &mut f.registry).unwrap();
        assert_eq!(block.header.proposer, expected);
        assert_ne!(f.registry.peek_proposer(), Some(expected));
    }

    #[test]
    fn test_commit_hook_sees_every_block() {
        let clock = Arc::new(ManualClock::new(0));
        let journal = Arc::new(InMemoryJournal::new());
        let mut assembler =
            BlockAssembler::new(AssemblerConfig::default(), clock.clone()).with_commit_hook(journal.clone());
        let mut pool = TransactionPool::new(10, 10, clock.clone());
        let mut registry = ValidatorRegistry::new(RegistryConfig::default(), clock);

        assembler.seed_genesis(Block::genesis(0, [1u8; 32], 1_000_000)).unwrap();
        assembler.produce_block(&mut pool, &mut registry).unwrap();
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_require_proposer_turn() {
        let config = AssemblerConfig {
            require_proposer_turn: true,
            ..AssemblerConfig::default()
        };
        let mut f = fixture(config);
        let other = address_from_string("other");
        f.registry
            .register_genesis(
                crate::consensus::ValidatorRegistration::new(other, vec![], crate::consensus::Rate::ZERO, 1),
                1,
            )
            .unwrap();

        assert!(f.assembler.produce_block(&mut f.pool, &mut f.registry).is_none());
        assert_eq!(f.assembler.chain().len(), 1);
    }

    #[test]
    fn test_gas_budget_limits_block() {
        let config = AssemblerConfig {
            block_gas_limit: 50_000,
            ..AssemblerConfig::default()
        };
        let mut f = fixture(config);
        for sender in ["a", "b", "c"] {
            f.pool.submit(tx(sender, 0)).unwrap();
        }
        let block = f.assembler.produce_block(&mut f.pool, &mut f.registry).unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert!(block.header.gas_used <= block.header.gas_limit);
        assert_eq!(f.pool.len(), 1);
    }

    #[test]
    fn test_import_block() {
        let mut producer = fixture(AssemblerConfig::default());
        let mut peer = fixture(AssemblerConfig::default());
        let t = tx("alice", 0);
        producer.pool.submit(t.clone()).unwrap();
        peer.pool.submit(t.clone()).unwrap();

        let block = producer
            .assembler
            .produce_block(&mut producer.pool, &mut producer.registry)
            .unwrap();

        let mut forged = block.clone();
        forged.header.height = 7;
        assert!(matches!(
            peer.assembler.import_block(forged, &mut peer.pool),
            Err(ChainError::InvalidBlock(BlockValidationError::HeightMismatch { .. }))
        ));
        assert_eq!(peer.assembler.chain().len(), 1);

        peer.assembler.import_block(block.clone(), &mut peer.pool).unwrap();
        assert!(peer.pool.is_empty());
        assert_eq!(peer.assembler.chain().get_latest_block(), Some(&block));
        assert_eq!(peer.assembler.stats().blocks_imported, 1);
    }

    #[test]
    fn test_seed_genesis_only_once() {
        let mut f = fixture(AssemblerConfig::default());
        assert!(matches!(
            f.assembler.seed_genesis(Block::genesis(0, [1u8; 32], 1)),
            Err(ChainError::GenesisAlreadySeeded)
        ));
    }
}
