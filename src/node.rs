//! Ledger core: the single owner of pool, registry and chain
//!
//! Locks are always taken in the order assembler, pool, registry. Block
//! production holds all three for the whole select/build/commit/remove unit.

use crate::blockchain::{Block, BlockAssembler, ChainStats, ProducerStats, TipState};
use crate::clock::Clock;
use crate::config::Config;
use crate::consensus::{
    Delegation, Rate, RegistryStats, Validator, ValidatorRegistration, ValidatorRegistry,
};
use crate::crypto::{Address, Sha256Hash};
use crate::error::ChainError;
use crate::mempool::{PoolStats, TransactionPool};
use crate::persistence::{CommitHook, FileJournal};
use crate::transaction::Transaction;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// No genesis block yet
    Booting,
    Ready,
}

pub struct LedgerCore {
    config: Config,
    clock: Arc<dyn Clock>,
    assembler: RwLock<BlockAssembler>,
    pool: RwLock<TransactionPool>,
    registry: RwLock<ValidatorRegistry>,
    pool_stats: watch::Sender<PoolStats>,
    state: RwLock<NodeState>,
}

impl LedgerCore {
    /// Builds the core from configuration, opening the block journal when
    /// one is configured.
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Result<Self, ChainError> {
        let hook: Option<Arc<dyn CommitHook>> = match &config.node.journal_path {
            Some(path) => Some(Arc::new(FileJournal::open(path)?) as Arc<dyn CommitHook>),
            None => None,
        };
        Self::with_commit_hook(config, clock, hook)
    }

    pub fn with_commit_hook(
        config: Config,
        clock: Arc<dyn Clock>,
        commit_hook: Option<Arc<dyn CommitHook>>,
    ) -> Result<Self, ChainError> {
        config.validate()?;

        let pool = TransactionPool::new(
            config.mempool.capacity,
            config.mempool.recent_capacity,
            clock.clone(),
        );

        let mut registry = ValidatorRegistry::new(config.registry_config(), clock.clone());
        for genesis in &config.validators.genesis {
            registry.register_genesis(genesis.registration()?, genesis.self_delegation)?;
        }

        let mut assembler = BlockAssembler::new(config.assembler_config()?, clock.clone());
        if let Some(hook) = commit_hook {
            assembler.set_commit_hook(hook);
        }

        info!(
            validator = %config.node.validator_address,
            genesis_validators = config.validators.genesis.len(),
            pool_capacity = config.mempool.capacity,
            "node.init"
        );

        let (pool_stats, _) = watch::channel(pool.stats());
        Ok(Self {
            config,
            clock,
            assembler: RwLock::new(assembler),
            pool: RwLock::new(pool),
            registry: RwLock::new(registry),
            pool_stats,
            state: RwLock::new(NodeState::Booting),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn state(&self) -> NodeState {
        *self.state.read().await
    }

    // ---- transaction ingress ----

    pub async fn submit(&self, tx: Transaction) -> Result<Sha256Hash, ChainError> {
        let hash = tx.hash();
        let mut pool = self.pool.write().await;
        if let Err(reason) = pool.submit(tx) {
            debug!(tx = %hex::encode(hash), reason = %reason, "mempool.rejected");
            return Err(reason.into());
        }
        self.pool_stats.send_replace(pool.stats());
        debug!(tx = %hex::encode(hash), pending = pool.len(), "mempool.accepted");
        Ok(hash)
    }

    pub async fn get_transaction(&self, hash: &Sha256Hash) -> Option<Transaction> {
        self.pool.read().await.get(hash).cloned()
    }

    pub async fn transactions_for_address(&self, address: &Address) -> Vec<Transaction> {
        self.pool.read().await.transactions_for_address(address)
    }

    pub async fn expected_nonce(&self, sender: &Address) -> u64 {
        self.pool.read().await.expected_nonce(sender)
    }

    pub async fn pending_count(&self) -> usize {
        self.pool.read().await.pending_count()
    }

    /// Latest published pool snapshot; never waits on the pool lock.
    pub fn stats(&self) -> PoolStats {
        self.pool_stats.borrow().clone()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<PoolStats> {
        self.pool_stats.subscribe()
    }

    /// Drops transactions older than the configured maximum age.
    pub async fn expire_transactions(&self) -> Vec<Sha256Hash> {
        let mut pool = self.pool.write().await;
        let expired = pool.expire(self.config.mempool.max_tx_age);
        if !expired.is_empty() {
            info!(count = expired.len(), "mempool.sweep");
            self.pool_stats.send_replace(pool.stats());
        }
        expired
    }

    // ---- blocks ----

    /// Seeds a genesis block proposed by the local validator.
    pub async fn seed_default_genesis(&self) -> Result<Block, ChainError> {
        let assembler_config = self.config.assembler_config()?;
        let genesis = Block::genesis(
            self.clock.now_millis(),
            assembler_config.local_validator,
            assembler_config.block_gas_limit,
        );
        self.seed_genesis(genesis.clone()).await?;
        Ok(genesis)
    }

    pub async fn seed_genesis(&self, block: Block) -> Result<(), ChainError> {
        self.assembler.write().await.seed_genesis(block)?;
        *self.state.write().await = NodeState::Ready;
        Ok(())
    }

    pub async fn produce_block(&self) -> Option<Block> {
        let mut assembler = self.assembler.write().await;
        let mut pool = self.pool.write().await;
        let mut registry = self.registry.write().await;

        let block = assembler.produce_block(&mut pool, &mut registry)?;
        self.pool_stats.send_replace(pool.stats());
        Some(block)
    }

    pub async fn validate_block(&self, block: &Block) -> bool {
        self.assembler.read().await.validate_block(block)
    }

    pub async fn import_block(&self, block: Block) -> Result<(), ChainError> {
        let mut assembler = self.assembler.write().await;
        let mut pool = self.pool.write().await;
        let result = assembler.import_block(block, &mut pool);
        if let Err(e) = &result {
            warn!(error = %e, "block.import_failed");
        } else {
            self.pool_stats.send_replace(pool.stats());
        }
        result
    }

    pub async fn get_block_by_height(&self, height: u64) -> Option<Block> {
        self.assembler.read().await.chain().get_block_by_height(height).cloned()
    }

    pub async fn get_block_by_hash(&self, hash: &Sha256Hash) -> Option<Block> {
        self.assembler.read().await.chain().get_block_by_hash(hash).cloned()
    }

    pub async fn get_latest_block(&self) -> Option<Block> {
        self.assembler.read().await.chain().get_latest_block().cloned()
    }

    pub async fn tip_state(&self) -> TipState {
        self.assembler.read().await.chain().tip_state()
    }

    pub async fn chain_stats(&self) -> ChainStats {
        self.assembler.read().await.chain_stats()
    }

    pub async fn producer_stats(&self) -> ProducerStats {
        self.assembler.read().await.stats()
    }

    // ---- validator administration ----

    pub async fn register_validator(&self, registration: ValidatorRegistration) -> Result<(), ChainError> {
        Ok(self.registry.write().await.register(registration)?)
    }

    pub async fn delegate(&self, delegator: Address, validator: Address, amount: u64) -> Result<(), ChainError> {
        Ok(self.registry.write().await.delegate(delegator, validator, amount)?)
    }

    pub async fn undelegate(&self, delegator: Address, validator: Address, amount: u64) -> Result<(), ChainError> {
        Ok(self.registry.write().await.undelegate(delegator, validator, amount)?)
    }

    pub async fn jail(&self, validator: Address, duration: Duration) -> Result<(), ChainError> {
        Ok(self.registry.write().await.jail(validator, duration)?)
    }

    pub async fn unjail(&self, validator: Address) -> Result<(), ChainError> {
        Ok(self.registry.write().await.unjail(validator)?)
    }

    pub async fn record_signature(&self, validator: Address, signed: bool) -> Result<(), ChainError> {
        Ok(self.registry.write().await.record_signature(validator, signed)?)
    }

    pub async fn edit_commission(&self, validator: Address, rate: Rate) -> Result<(), ChainError> {
        Ok(self.registry.write().await.edit_commission(validator, rate)?)
    }

    pub async fn begin_unbonding(&self, validator: Address) -> Result<(), ChainError> {
        Ok(self.registry.write().await.begin_unbonding(validator)?)
    }

    pub async fn complete_unbonding(&self) -> Vec<Address> {
        self.registry.write().await.complete_unbonding()
    }

    pub async fn get_validator(&self, address: &Address) -> Option<Validator> {
        self.registry.read().await.get_validator(address).cloned()
    }

    pub async fn all_validators(&self) -> Vec<Validator> {
        self.registry.read().await.validators().cloned().collect()
    }

    pub async fn get_active_set(&self) -> Vec<Address> {
        self.registry.read().await.get_active_set().to_vec()
    }

    pub async fn delegations(&self, validator: &Address) -> Vec<Delegation> {
        self.registry.read().await.delegations(validator).to_vec()
    }

    pub async fn registry_stats(&self) -> RegistryStats {
        self.registry.read().await.stats()
    }

    // ---- scheduling ----

    /// Produces a block every `block_interval` and sweeps stale transactions
    /// and matured unbondings every `expiry_sweep_interval`. Stops when
    /// `shutdown` turns true or its sender is dropped, or after `max_ticks`
    /// block ticks. Returns the number of blocks produced.
    pub async fn run_block_production(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        max_ticks: Option<u64>,
    ) -> u64 {
        let mut block_tick = tokio::time::interval(self.config.node.block_interval);
        block_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep_tick = tokio::time::interval(self.config.node.expiry_sweep_interval);
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick of an interval completes immediately.
        block_tick.tick().await;
        sweep_tick.tick().await;

        info!(
            interval = ?self.config.node.block_interval,
            "node.production_started"
        );

        let mut ticks: u64 = 0;
        let mut produced: u64 = 0;
        loop {
            tokio::select! {
                _ = block_tick.tick() => {
                    ticks += 1;
                    if self.produce_block().await.is_some() {
                        produced += 1;
                    }
                    if max_ticks.is_some_and(|max| ticks >= max) {
                        break;
                    }
                }
                _ = sweep_tick.tick() => {
                    self.expire_transactions().await;
                    self.complete_unbonding().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(ticks, produced, "node.production_stopped");
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::address_from_string;
    use crate::error::RejectReason;
    use crate::persistence::InMemoryJournal;
    use crate::transaction::{Payload, TxBody};

    fn core_with(config: Config) -> (LedgerCore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (LedgerCore::new(config, clock.clone()).unwrap(), clock)
    }

    fn tx(sender: &str, nonce: u64, fee: i64) -> Transaction {
        TxBody::new(
            address_from_string(sender),
            address_from_string("bob"),
            1,
            fee,
            nonce,
            Payload::Transfer,
            0,
        )
        .seal()
    }

    #[tokio::test]
    async fn test_submit_publishes_stats_snapshot() {
        let (core, _) = core_with(Config::default());
        let mut rx = core.subscribe_stats();

        core.submit(tx("alice", 0, 21_000)).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().pending_count, 1);
        assert_eq!(core.stats().pending_count, 1);
        assert_eq!(core.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_submit_rejection_is_typed() {
        let (core, _) = core_with(Config::default());
        let err = core.submit(tx("alice", 3, 21_000)).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Admission(RejectReason::NonceMismatch { expected: 0, got: 3 })
        ));
    }

    #[tokio::test]
    async fn test_produce_requires_genesis() {
        let (core, _) = core_with(Config::default());
        assert_eq!(core.state().await, NodeState::Booting);
        assert!(core.produce_block().await.is_none());

        core.seed_default_genesis().await.unwrap();
        assert_eq!(core.state().await, NodeState::Ready);

        core.submit(tx("alice", 0, 21_000)).await.unwrap();
        let block = core.produce_block().await.unwrap();
        assert_eq!(block.height(), 1);
        assert_eq!(core.stats().pending_count, 0);
        assert_eq!(core.get_latest_block().await, Some(block.clone()));
        assert_eq!(core.get_block_by_hash(&block.hash()).await, Some(block));
        assert!(core.get_transaction(&tx("alice", 0, 21_000).hash()).await.is_some());
    }

    #[tokio::test]
    async fn test_genesis_validators_rotate() {
        let mut config = Config::default();
        config.validators.genesis = ["alpha", "beta"]
            .iter()
            .map(|label| crate::config::GenesisValidator {
                address: label.to_string(),
                moniker: label.to_string(),
                pub_key: String::new(),
                commission_rate: 0.05,
                min_self_delegation: 1_000_000,
                self_delegation: 1_000_000,
                license: None,
            })
            .collect();
        let (core, _) = core_with(config);
        core.seed_default_genesis().await.unwrap();

        assert_eq!(core.get_active_set().await.len(), 2);
        let a = core.produce_block().await.unwrap().header.proposer;
        let b = core.produce_block().await.unwrap().header.proposer;
        let c = core.produce_block().await.unwrap().header.proposer;
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[tokio::test]
    async fn test_expire_transactions_uses_configured_age() {
        let mut config = Config::default();
        config.mempool.max_tx_age = Duration::from_secs(10);
        let (core, clock) = core_with(config);

        core.submit(tx("alice", 0, 21_000)).await.unwrap();
        clock.advance(Duration::from_secs(11));
        assert_eq!(core.expire_transactions().await.len(), 1);
        assert_eq!(core.stats().pending_count, 0);
        assert_eq!(core.expected_nonce(&address_from_string("alice")).await, 0);
    }

    #[tokio::test]
    async fn test_commit_hook_receives_blocks() {
        let journal = Arc::new(InMemoryJournal::new());
        let core = LedgerCore::with_commit_hook(
            Config::default(),
            Arc::new(ManualClock::new(0)),
            Some(journal.clone() as Arc<dyn CommitHook>),
        )
        .unwrap();
        core.seed_default_genesis().await.unwrap();
        core.produce_block().await.unwrap();
        assert_eq!(journal.len(), 2);
    }

    #[tokio::test]
    async fn test_production_loop_stops_after_ticks() {
        let mut config = Config::default();
        config.node.block_interval = Duration::from_millis(10);
        let core = Arc::new(core_with(config).0);
        core.seed_default_genesis().await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let produced = tokio::time::timeout(
            Duration::from_secs(5),
            core.clone().run_block_production(rx, Some(3)),
        )
        .await
        .unwrap();
        assert_eq!(produced, 3);
        assert_eq!(core.chain_stats().await.latest_height, Some(3));
    }

    #[tokio::test]
    async fn test_production_loop_honours_shutdown() {
        let mut config = Config::default();
        config.node.block_interval = Duration::from_secs(3600);
        let core = Arc::new(core_with(config).0);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(core.clone().run_block_production(rx, None));
        tx.send(true).unwrap();

        let produced = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(produced, 0);
    }
}
