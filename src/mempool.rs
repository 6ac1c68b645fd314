//! Transaction pool (mempool) with fee-per-gas priority ordering
//!
//! ## Features
//!
//! - **Fee-priority ordering**: entries keyed by (fee-per-gas descending, insertion order) in a `BTreeMap`
//! - **Gapless nonces**: each sender's expected nonce starts at 0 and advances by one per admission
//! - **Capacity eviction**: at capacity, the single lowest fee-per-gas entry makes room for the newcomer
//! - **Recently-included cache**: bounded LRU of transactions that left the pool through a block
//!
//! | Operation          | Complexity      |
//! |--------------------|-----------------|
//! | `submit`           | O(log n)        |
//! | `remove`           | O(k log n)      |
//! | `select_for_block` | O(m)            |
//! | `expire`           | O(n + e log n)  |
//!
//! Where n = pool size, k = hashes removed, m = entries examined, e = entries expired.
//!
//! `TransactionPool` is not thread-safe; the node wraps it in a lock.

use crate::clock::{duration_millis, Clock};
use crate::crypto::{Address, Sha256Hash};
use crate::error::RejectReason;
use crate::transaction::{PayloadKind, Transaction};
use lru::LruCache;
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default maximum capacity of the transaction pool.
pub const DEFAULT_POOL_CAPACITY: usize = 10_000;

/// Default size of the recently-included cache.
pub const DEFAULT_RECENT_CAPACITY: usize = 10_000;

/// A fee divided by a gas limit, compared exactly by cross-multiplication.
#[derive(Debug, Clone, Copy)]
pub struct FeePerGas {
    fee: i64,
    gas: i64,
}

impl FeePerGas {
    pub fn new(fee: i64, gas: i64) -> Self {
        Self { fee, gas }
    }

    pub fn of(tx: &Transaction) -> Self {
        Self::new(tx.fee(), tx.gas_limit())
    }

    pub fn as_f64(&self) -> f64 {
        if self.gas == 0 {
            return 0.0;
        }
        self.fee as f64 / self.gas as f64
    }
}

// Gas is always positive for admitted transactions, so the cross products
// preserve the ordering of the quotients.
impl Ord for FeePerGas {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.fee as i128 * other.gas as i128;
        let rhs = other.fee as i128 * self.gas as i128;
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for FeePerGas {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FeePerGas {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FeePerGas {}

/// Priority key: highest fee-per-gas first, then earliest insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PriorityKey {
    fee_per_gas: Reverse<FeePerGas>,
    seq: u64,
}

/// A pending transaction plus pool bookkeeping.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub tx: Transaction,
    pub fee_per_gas: FeePerGas,
    /// Insertion sequence number, the priority tie-break.
    pub seq: u64,
    /// When the pool admitted the transaction (ms).
    pub received_at: u64,
}

impl PoolEntry {
    fn key(&self) -> PriorityKey {
        PriorityKey {
            fee_per_gas: Reverse(self.fee_per_gas),
            seq: self.seq,
        }
    }
}

/// Read-only pool summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolStats {
    pub pending_count: usize,
    pub total_fees: u64,
    pub average_fee: f64,
    pub type_distribution: BTreeMap<PayloadKind, usize>,
    pub capacity: usize,
    pub recently_included: usize,
    pub best_fee_per_gas: Option<f64>,
    pub admitted_total: u64,
    pub evicted_total: u64,
    pub expired_total: u64,
    pub included_total: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    admitted: u64,
    evicted: u64,
    expired: u64,
    included: u64,
}

pub struct TransactionPool {
    /// All pending entries indexed by hash
    entries: HashMap<Sha256Hash, PoolEntry>,
    /// Fee priority index, best first
    by_priority: BTreeMap<PriorityKey, Sha256Hash>,
    /// Pending hashes per sender, keyed by nonce
    by_sender: HashMap<Address, BTreeMap<u64, Sha256Hash>>,
    /// Next acceptable nonce per sender; absent means 0
    nonces: HashMap<Address, u64>,
    /// Transactions that recently left the pool through a block
    recent: LruCache<Sha256Hash, Transaction>,
    capacity: usize,
    next_seq: u64,
    counters: Counters,
    clock: Arc<dyn Clock>,
}

impl TransactionPool {
    pub fn new(capacity: usize, recent_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let recent_nz = NonZeroUsize::new(recent_capacity).unwrap_or(NonZeroUsize::MIN);
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            by_priority: BTreeMap::new(),
            by_sender: HashMap::new(),
            nonces: HashMap::new(),
            recent: LruCache::new(recent_nz),
            capacity,
            next_seq: 0,
            counters: Counters::default(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, hash: &Sha256Hash) -> bool {
        self.entries.contains_key(hash)
    }

    /// The nonce the next transaction from `sender` must carry.
    pub fn expected_nonce(&self, sender: &Address) -> u64 {
        self.nonces.get(sender).copied().unwrap_or(0)
    }

    /// Admits a transaction. At capacity the lowest fee-per-gas entry is
    /// evicted first, skipping the newcomer's own sender since the newcomer
    /// depends on those nonces. A pool holding only that sender's entries
    /// rejects with `PoolFull`.
    pub fn submit(&mut self, tx: Transaction) -> Result<(), RejectReason> {
        tx.validate_stateless()?;

        let hash = tx.hash();
        if self.entries.contains_key(&hash) {
            return Err(RejectReason::Duplicate(tx.hash_str()));
        }

        let sender = *tx.sender();
        let expected = self.expected_nonce(&sender);
        if tx.nonce() != expected {
            return Err(RejectReason::NonceMismatch {
                expected,
                got: tx.nonce(),
            });
        }

        if self.entries.len() >= self.capacity && !self.evict_lowest(&sender) {
            return Err(RejectReason::PoolFull {
                capacity: self.capacity,
            });
        }

        let nonce = tx.nonce();
        let entry = PoolEntry {
            fee_per_gas: FeePerGas::of(&tx),
            seq: self.next_seq,
            received_at: self.clock.now_millis(),
            tx,
        };
        self.next_seq += 1;

        self.by_priority.insert(entry.key(), hash);
        self.by_sender.entry(sender).or_default().insert(nonce, hash);
        self.entries.insert(hash, entry);
        self.nonces.insert(sender, nonce + 1);
        self.counters.admitted += 1;

        Ok(())
    }

    /// Picks up to `max_count` transactions within `max_gas`, best
    /// fee-per-gas first, at most one per sender. Only a sender's lowest
    /// pending nonce is eligible. Entries that would overflow the gas budget
    /// are skipped so smaller ones further down can still fit.
    pub fn select_for_block(&self, max_count: usize, max_gas: u64) -> Vec<Transaction> {
        let mut selected = Vec::with_capacity(max_count.min(self.entries.len()));
        let mut used_senders: HashSet<Address> = HashSet::new();
        let mut total_gas: u64 = 0;

        for hash in self.by_priority.values() {
            if selected.len() >= max_count {
                break;
            }

            let Some(entry) = self.entries.get(hash) else {
                continue;
            };

            let sender = entry.tx.sender();
            if used_senders.contains(sender) || !self.is_next_for_sender(entry) {
                continue;
            }

            let gas = entry.tx.gas_units();
            if total_gas.saturating_add(gas) > max_gas {
                continue;
            }

            total_gas += gas;
            used_senders.insert(*sender);
            selected.push(entry.tx.clone());
        }

        selected
    }

    /// Moves included transactions into the recently-included cache.
    /// Nonce counters are left alone; they advanced at admission.
    pub fn remove(&mut self, hashes: &[Sha256Hash]) -> usize {
        let mut removed = 0;
        for hash in hashes {
            if let Some(entry) = self.remove_entry(hash) {
                self.recent.put(*hash, entry.tx);
                removed += 1;
            }
        }
        self.counters.included += removed as u64;
        removed
    }

    /// Drops entries admitted more than `max_age` ago, together with any
    /// later nonces from the same sender, and rolls each sender's nonce back
    /// to its lowest dropped one. Returns the dropped hashes.
    pub fn expire(&mut self, max_age: Duration) -> Vec<Sha256Hash> {
        let cutoff = self.clock.now_millis().saturating_sub(duration_millis(max_age));

        let mut stale: Vec<(Address, u64)> = self
            .entries
            .values()
            .filter(|e| e.received_at < cutoff)
            .map(|e| (*e.tx.sender(), e.tx.nonce()))
            .collect();
        stale.sort();

        let mut expired = Vec::with_capacity(stale.len());
        for (sender, nonce) in stale {
            for entry in self.truncate_sender(&sender, nonce) {
                expired.push(entry.tx.hash());
            }
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "mempool.expired");
        }
        self.counters.expired += expired.len() as u64;
        expired
    }

    /// Looks in the live pool first, then in the recently-included cache.
    pub fn get(&self, hash: &Sha256Hash) -> Option<&Transaction> {
        self.entries
            .get(hash)
            .map(|e| &e.tx)
            .or_else(|| self.recent.peek(hash))
    }

    pub fn get_entry(&self, hash: &Sha256Hash) -> Option<&PoolEntry> {
        self.entries.get(hash)
    }

    /// Pending and recently-included transactions touching `address`, newest first.
    pub fn transactions_for_address(&self, address: &Address) -> Vec<Transaction> {
        let touches = |tx: &Transaction| tx.sender() == address || tx.recipient() == address;

        let mut found: Vec<Transaction> = self
            .entries
            .values()
            .map(|e| &e.tx)
            .chain(self.recent.iter().map(|(_, tx)| tx))
            .filter(|tx| touches(tx))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()).then(a.hash().cmp(&b.hash())));
        found
    }

    /// Pending transactions in priority order.
    pub fn iter_by_priority(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.by_priority
            .values()
            .filter_map(|h| self.entries.get(h).map(|e| &e.tx))
    }

    pub fn stats(&self) -> PoolStats {
        let mut total_fees: u64 = 0;
        let mut type_distribution = BTreeMap::new();
        for entry in self.entries.values() {
            total_fees = total_fees.saturating_add(entry.tx.fee().max(0) as u64);
            *type_distribution.entry(entry.tx.kind()).or_insert(0) += 1;
        }

        let pending_count = self.entries.len();
        let average_fee = if pending_count == 0 {
            0.0
        } else {
            total_fees as f64 / pending_count as f64
        };

        let best_fee_per_gas = self
            .by_priority
            .values()
            .next()
            .and_then(|h| self.entries.get(h))
            .map(|e| e.fee_per_gas.as_f64());

        PoolStats {
            pending_count,
            total_fees,
            average_fee,
            type_distribution,
            capacity: self.capacity,
            recently_included: self.recent.len(),
            best_fee_per_gas,
            admitted_total: self.counters.admitted,
            evicted_total: self.counters.evicted,
            expired_total: self.counters.expired,
            included_total: self.counters.included,
        }
    }

    fn is_next_for_sender(&self, entry: &PoolEntry) -> bool {
        self.by_sender
            .get(entry.tx.sender())
            .and_then(|nonces| nonces.keys().next())
            .is_some_and(|lowest| *lowest == entry.tx.nonce())
    }

    /// Evicts the lowest fee-per-gas entry not sent by `newcomer`, along
    /// with its sender's later nonces. Returns false when nothing qualifies.
    fn evict_lowest(&mut self, newcomer: &Address) -> bool {
        let victim = self
            .by_priority
            .values()
            .rev()
            .filter_map(|h| self.entries.get(h))
            .find(|e| e.tx.sender() != newcomer)
            .map(|e| (*e.tx.sender(), e.tx.nonce(), e.fee_per_gas));
        let Some((sender, nonce, fee_per_gas)) = victim else {
            return false;
        };

        let dropped = self.truncate_sender(&sender, nonce);
        self.counters.evicted += dropped.len() as u64;
        debug!(
            sender = %hex::encode(sender),
            nonce,
            dropped = dropped.len(),
            fee_per_gas = fee_per_gas.as_f64(),
            "mempool.evicted"
        );
        !dropped.is_empty()
    }

    /// Removes `sender`'s pending entries from `nonce` upwards and resets its
    /// expected nonce to `nonce`, so no pending nonce sits above a gap.
    fn truncate_sender(&mut self, sender: &Address, nonce: u64) -> Vec<PoolEntry> {
        let hashes: Vec<Sha256Hash> = self
            .by_sender
            .get(sender)
            .map(|nonces| nonces.range(nonce..).map(|(_, h)| *h).collect())
            .unwrap_or_default();
        if hashes.is_empty() {
            return Vec::new();
        }

        let dropped: Vec<PoolEntry> = hashes.iter().filter_map(|h| self.remove_entry(h)).collect();
        if nonce == 0 {
            self.nonces.remove(sender);
        } else {
            self.nonces.insert(*sender, nonce);
        }
        dropped
    }

    fn remove_entry(&mut self, hash: &Sha256Hash) -> Option<PoolEntry> {
        let entry = self.entries.remove(hash)?;
        self.by_priority.remove(&entry.key());

        let sender = *entry.tx.sender();
        if let Some(nonces) = self.by_sender.get_mut(&sender) {
            nonces.remove(&entry.tx.nonce());
            if nonces.is_empty() {
                self.by_sender.remove(&sender);
            }
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::address_from_string;
    use crate::transaction::{Payload, TxBody};

    const GAS: i64 = 21_000;

    fn pool(capacity: usize) -> (TransactionPool, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (TransactionPool::new(capacity, 16, clock.clone()), clock)
    }

    /// A transfer whose fee-per-gas equals `rate`.
    fn tx(sender: &str, nonce: u64, rate: i64) -> Transaction {
        TxBody::new(
            address_from_string(sender),
            address_from_string("recipient"),
            100,
            rate * GAS,
            nonce,
            Payload::Transfer,
            1_000,
        )
        .with_gas(GAS, rate.max(1))
        .seal()
    }

    #[test]
    fn test_capacity_eviction_scenario() {
        let (mut pool, _) = pool(2);
        let tx1 = tx("s1", 0, 5);
        let tx2 = tx("s2", 0, 10);
        let tx3 = tx("s3", 0, 20);

        pool.submit(tx1.clone()).unwrap();
        pool.submit(tx2.clone()).unwrap();
        pool.submit(tx3.clone()).unwrap();

        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&tx1.hash()));
        assert_eq!(pool.expected_nonce(tx1.sender()), 0);
        assert_eq!(pool.stats().evicted_total, 1);

        let selected = pool.select_for_block(2, u64::MAX);
        assert_eq!(selected, vec![tx3, tx2]);
    }

    #[test]
    fn test_evicted_sender_can_resubmit_same_nonce() {
        let (mut pool, _) = pool(1);
        let low = tx("s1", 0, 1);
        pool.submit(low.clone()).unwrap();
        pool.submit(tx("s2", 0, 9)).unwrap();

        assert_eq!(pool.expected_nonce(low.sender()), 0);
        assert!(pool.submit(tx("s1", 0, 2)).is_ok());
    }

    #[test]
    fn test_nonce_must_match_expected() {
        let (mut pool, _) = pool(10);
        let sender = address_from_string("alice");

        assert_eq!(
            pool.submit(tx("alice", 1, 5)),
            Err(RejectReason::NonceMismatch {
                expected: 0,
                got: 1
            })
        );
        pool.submit(tx("alice", 0, 5)).unwrap();
        assert_eq!(pool.expected_nonce(&sender), 1);
        pool.submit(tx("alice", 1, 5)).unwrap();
        assert_eq!(pool.expected_nonce(&sender), 2);
        assert!(pool.submit(tx("alice", 1, 6)).is_err());
        assert_eq!(pool.expected_nonce(&sender), 2);
    }

    #[test]
    fn test_duplicate_rejected() {
        let (mut pool, _) = pool(10);
        let t = tx("alice", 0, 5);
        pool.submit(t.clone()).unwrap();
        assert!(matches!(pool.submit(t), Err(RejectReason::Duplicate(_))));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_invalid_transaction_does_not_evict() {
        let (mut pool, _) = pool(1);
        pool.submit(tx("alice", 0, 5)).unwrap();
        let bad = TxBody::new(
            address_from_string("bob"),
            address_from_string("carol"),
            -1,
            0,
            0,
            Payload::Transfer,
            0,
        )
        .seal();
        assert!(pool.submit(bad).is_err());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.stats().evicted_total, 0);
    }

    #[test]
    fn test_one_transaction_per_sender_per_block() {
        let (mut pool, _) = pool(10);
        pool.submit(tx("alice", 0, 50)).unwrap();
        pool.submit(tx("alice", 1, 40)).unwrap();
        pool.submit(tx("bob", 0, 10)).unwrap();

        let selected = pool.select_for_block(10, u64::MAX);
        assert_eq!(selected.len(), 2);
        let senders: HashSet<_> = selected.iter().map(|t| *t.sender()).collect();
        assert_eq!(senders.len(), 2);
        assert_eq!(selected[0].nonce(), 0);
    }

    #[test]
    fn test_only_lowest_pending_nonce_is_eligible() {
        let (mut pool, _) = pool(10);
        pool.submit(tx("alice", 0, 1)).unwrap();
        pool.submit(tx("alice", 1, 100)).unwrap();
        pool.submit(tx("bob", 0, 50)).unwrap();

        let selected = pool.select_for_block(10, u64::MAX);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].sender(), &address_from_string("bob"));
        assert_eq!(selected[1].nonce(), 0);
    }

    #[test]
    fn test_fee_priority_and_insertion_tie_break() {
        let (mut pool, _) = pool(10);
        let a = tx("a", 0, 7);
        let b = tx("b", 0, 7);
        let c = tx("c", 0, 30);
        pool.submit(a.clone()).unwrap();
        pool.submit(b.clone()).unwrap();
        pool.submit(c.clone()).unwrap();

        assert_eq!(pool.select_for_block(10, u64::MAX), vec![c, a, b]);
    }

    #[test]
    fn test_fee_per_gas_compares_exactly() {
        // 1/3 < 2/5 even though both round to the same integer rate
        assert!(FeePerGas::new(1, 3) < FeePerGas::new(2, 5));
        assert_eq!(FeePerGas::new(2, 4), FeePerGas::new(1, 2));
    }

    #[test]
    fn test_select_respects_count_and_gas_budget() {
        let (mut pool, _) = pool(10);
        let big = TxBody::new(
            address_from_string("whale"),
            address_from_string("recipient"),
            1,
            100 * 50_000,
            0,
            Payload::Transfer,
            0,
        )
        .with_gas(50_000, 100)
        .seal();
        pool.submit(big).unwrap();
        pool.submit(tx("a", 0, 10)).unwrap();
        pool.submit(tx("b", 0, 9)).unwrap();

        let selected = pool.select_for_block(10, 45_000);
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|t| t.gas_limit() == GAS));

        assert_eq!(pool.select_for_block(1, u64::MAX).len(), 1);
        assert!(pool.select_for_block(0, u64::MAX).is_empty());
    }

    #[test]
    fn test_remove_moves_to_recent_cache_and_keeps_nonce() {
        let (mut pool, _) = pool(10);
        let t = tx("alice", 0, 5);
        pool.submit(t.clone()).unwrap();

        assert_eq!(pool.remove(&[t.hash(), [9u8; 32]]), 1);
        assert!(pool.is_empty());
        assert_eq!(pool.get(&t.hash()), Some(&t));
        assert_eq!(pool.expected_nonce(t.sender()), 1);
        assert_eq!(pool.stats().recently_included, 1);
        assert_eq!(pool.stats().included_total, 1);
    }

    #[test]
    fn test_expire_rolls_back_nonces() {
        let (mut pool, clock) = pool(10);
        pool.submit(tx("alice", 0, 5)).unwrap();
        pool.submit(tx("alice", 1, 5)).unwrap();
        clock.advance(Duration::from_secs(60));
        pool.submit(tx("bob", 0, 5)).unwrap();

        let expired = pool.expire(Duration::from_secs(30));
        assert_eq!(expired.len(), 2);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.expected_nonce(&address_from_string("alice")), 0);
        assert_eq!(pool.expected_nonce(&address_from_string("bob")), 1);
        assert_eq!(pool.stats().expired_total, 2);
    }

    /// Every sender's pending nonces start at its lowest pending one and
    /// run without gaps up to `expected_nonce - 1`.
    fn assert_gapless(pool: &TransactionPool) {
        for (sender, nonces) in &pool.by_sender {
            let pending: Vec<u64> = nonces.keys().copied().collect();
            let first = pending[0];
            let contiguous: Vec<u64> = (first..first + pending.len() as u64).collect();
            assert_eq!(pending, contiguous);
            assert_eq!(pool.expected_nonce(sender), first + pending.len() as u64);
        }
    }

    #[test]
    fn test_evicting_lower_nonce_drops_later_nonces() {
        let (mut pool, _) = pool(2);
        let alice = address_from_string("alice");
        pool.submit(tx("alice", 0, 1)).unwrap();
        pool.submit(tx("alice", 1, 50)).unwrap();
        pool.submit(tx("bob", 0, 20)).unwrap();

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.expected_nonce(&alice), 0);
        assert_eq!(pool.stats().evicted_total, 2);
        assert_gapless(&pool);

        let selected = pool.select_for_block(10, u64::MAX);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].sender(), &address_from_string("bob"));

        pool.submit(tx("alice", 0, 3)).unwrap();
        assert_eq!(pool.expected_nonce(&alice), 1);
        assert_gapless(&pool);
    }

    #[test]
    fn test_newcomer_never_evicts_its_own_earlier_nonce() {
        let (mut pool, _) = pool(1);
        let alice = address_from_string("alice");
        let first = tx("alice", 0, 1);
        pool.submit(first.clone()).unwrap();

        assert_eq!(
            pool.submit(tx("alice", 1, 90)),
            Err(RejectReason::PoolFull { capacity: 1 })
        );
        assert!(pool.contains(&first.hash()));
        assert_eq!(pool.expected_nonce(&alice), 1);
        assert_eq!(pool.stats().evicted_total, 0);
        assert_gapless(&pool);

        // With room elsewhere, another sender is evicted instead
        let (mut pool, _) = pool_with_bob();
        pool.submit(tx("alice", 1, 90)).unwrap();
        assert!(!pool.contains(&tx("bob", 0, 40).hash()));
        assert_eq!(pool.expected_nonce(&address_from_string("bob")), 0);
        assert_eq!(pool.expected_nonce(&alice), 2);
        assert_gapless(&pool);
        assert_eq!(pool.select_for_block(10, u64::MAX)[0].nonce(), 0);
    }

    fn pool_with_bob() -> (TransactionPool, Arc<ManualClock>) {
        let (mut pool, clock) = pool(2);
        pool.submit(tx("alice", 0, 1)).unwrap();
        pool.submit(tx("bob", 0, 40)).unwrap();
        (pool, clock)
    }

    #[test]
    fn test_expiring_lower_nonce_drops_fresh_later_nonces() {
        let (mut pool, clock) = pool(10);
        let alice = address_from_string("alice");
        let n0 = tx("alice", 0, 5);
        let n1 = tx("alice", 1, 5);
        pool.submit(n0.clone()).unwrap();
        clock.advance(Duration::from_secs(60));
        pool.submit(n1.clone()).unwrap();

        let expired = pool.expire(Duration::from_secs(30));
        assert_eq!(expired, vec![n0.hash(), n1.hash()]);
        assert!(pool.is_empty());
        assert_eq!(pool.expected_nonce(&alice), 0);
        assert_eq!(pool.stats().expired_total, 2);
        assert!(pool.select_for_block(10, u64::MAX).is_empty());

        pool.submit(tx("alice", 0, 7)).unwrap();
        assert_gapless(&pool);
    }

    #[test]
    fn test_expiring_middle_nonce_keeps_earlier_ones() {
        let (mut pool, clock) = pool(10);
        let alice = address_from_string("alice");
        pool.submit(tx("alice", 0, 5)).unwrap();
        pool.remove(&[tx("alice", 0, 5).hash()]);
        pool.submit(tx("alice", 1, 5)).unwrap();
        clock.advance(Duration::from_secs(60));
        pool.submit(tx("alice", 2, 5)).unwrap();

        assert_eq!(pool.expire(Duration::from_secs(30)).len(), 2);
        assert_eq!(pool.expected_nonce(&alice), 1);
        pool.submit(tx("alice", 1, 6)).unwrap();
        assert_gapless(&pool);
    }

    #[test]
    fn test_stats_type_distribution() {
        let (mut pool, _) = pool(10);
        pool.submit(tx("alice", 0, 2)).unwrap();
        let stake = TxBody::new(
            address_from_string("bob"),
            address_from_string("val"),
            500,
            21_000,
            0,
            Payload::Stake {
                validator: address_from_string("val"),
            },
            0,
        )
        .seal();
        pool.submit(stake).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.pending_count, 2);
        assert_eq!(stats.type_distribution.get(&PayloadKind::Transfer), Some(&1));
        assert_eq!(stats.type_distribution.get(&PayloadKind::Stake), Some(&1));
        assert_eq!(stats.total_fees, 2 * GAS as u64 + 21_000);
        assert_eq!(stats.best_fee_per_gas, Some(2.0));
    }

    #[test]
    fn test_transactions_for_address() {
        let (mut pool, _) = pool(10);
        let t1 = tx("alice", 0, 5);
        let t2 = tx("bob", 0, 5);
        pool.submit(t1.clone()).unwrap();
        pool.submit(t2.clone()).unwrap();
        pool.remove(&[t1.hash()]);

        let alice = pool.transactions_for_address(&address_from_string("alice"));
        assert_eq!(alice, vec![t1]);
        let recipient = pool.transactions_for_address(&address_from_string("recipient"));
        assert_eq!(recipient.len(), 2);
    }
}
