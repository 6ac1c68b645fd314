//! Bonded-stake validator registry with active-set ranking and proposer rotation
//!
//! Lifecycle per validator:
//!
//! ```text
//! Inactive --(self bond >= min)--> Active --(missed blocks / jail)--> Jailed
//!    ^                               |  ^                               |
//!    +----(self bond < min)----------+  +-----(unjail after cooldown)---+
//!    ^
//!    +----(unbonding matures)---- Unbonding <--(begin_unbonding)-- Active/Inactive
//! ```
//!
//! The active set is recomputed after every mutation that can change it, so
//! `next_proposer` never observes a half-updated set.

use super::validator::{
    Commission, Delegation, Rate, Validator, ValidatorRegistration, ValidatorStatus,
};
use crate::clock::{duration_millis, Clock};
use crate::crypto::Address;
use crate::error::RegistryError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MAX_VALIDATORS: usize = 21;
pub const DEFAULT_MISSED_BLOCK_THRESHOLD: u64 = 50;
pub const DEFAULT_UPTIME_WINDOW: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ProposerSelection {
    RoundRobin,
    /// Stake-weighted draw from a generator seeded with `seed`
    StakeWeighted { seed: u64 },
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub max_validators: usize,
    pub missed_block_threshold: u64,
    pub downtime_jail: Duration,
    pub default_jail: Duration,
    pub uptime_window: usize,
    pub unbonding_period: Duration,
    pub proposer_selection: ProposerSelection,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_validators: DEFAULT_MAX_VALIDATORS,
            missed_block_threshold: DEFAULT_MISSED_BLOCK_THRESHOLD,
            downtime_jail: Duration::from_secs(3600),
            default_jail: Duration::from_secs(600),
            uptime_window: DEFAULT_UPTIME_WINDOW,
            unbonding_period: Duration::from_secs(21 * 24 * 3600),
            proposer_selection: ProposerSelection::RoundRobin,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    pub total_validators: usize,
    pub active_validators: usize,
    pub jailed_validators: usize,
    pub unbonding_validators: usize,
    pub total_stake: u64,
    pub active_stake: u64,
    pub bonded_ratio: f64,
}

pub struct ValidatorRegistry {
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    validators: BTreeMap<Address, Validator>,
    /// Delegations per validator, oldest first
    delegations: BTreeMap<Address, Vec<Delegation>>,
    /// Rolling signed/missed window per validator
    signing: HashMap<Address, VecDeque<bool>>,
    active_set: Vec<Address>,
    proposer_index: usize,
    rng: StdRng,
}

impl ValidatorRegistry {
    pub fn new(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        let seed = match config.proposer_selection {
            ProposerSelection::StakeWeighted { seed } => seed,
            ProposerSelection::RoundRobin => 0,
        };
        Self {
            config,
            clock,
            validators: BTreeMap::new(),
            delegations: BTreeMap::new(),
            signing: HashMap::new(),
            active_set: Vec::new(),
            proposer_index: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn register(&mut self, registration: ValidatorRegistration) -> Result<(), RegistryError> {
        let address = registration.address;
        if self.validators.contains_key(&address) {
            return Err(RegistryError::AlreadyRegistered(hex::encode(address)));
        }
        let commission = Commission::new(registration.commission_rate)?;

        let validator = Validator {
            address,
            pub_key: registration.pub_key,
            description: registration.description,
            commission,
            min_self_delegation: registration.min_self_delegation,
            self_delegation: 0,
            total_delegation: 0,
            status: ValidatorStatus::Inactive,
            jailed_until: None,
            unbonding_until: None,
            missed_blocks: 0,
            uptime: Rate::from_num(100),
            license: registration.license,
            created_at: self.clock.now_millis(),
        };

        info!(
            validator = %validator.address_hex(),
            moniker = %validator.description.moniker,
            min_self_delegation = validator.min_self_delegation,
            "validator.registered"
        );
        self.validators.insert(address, validator);
        Ok(())
    }

    /// Registers a validator and bonds its initial self-delegation.
    pub fn register_genesis(
        &mut self,
        registration: ValidatorRegistration,
        self_bond: u64,
    ) -> Result<(), RegistryError> {
        let address = registration.address;
        self.register(registration)?;
        if self_bond > 0 {
            self.delegate(address, address, self_bond)?;
        }
        Ok(())
    }

    pub fn delegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: u64,
    ) -> Result<(), RegistryError> {
        let now = self.clock.now_millis();
        let v = self
            .validators
            .get_mut(&validator)
            .ok_or_else(|| RegistryError::UnknownValidator(hex::encode(validator)))?;
        if amount == 0 {
            return Err(RegistryError::ZeroAmount);
        }

        v.total_delegation = v.total_delegation.saturating_add(amount);
        if delegator == validator {
            v.self_delegation = v.self_delegation.saturating_add(amount);
        }
        if v.status == ValidatorStatus::Inactive && v.meets_self_bond() {
            v.status = ValidatorStatus::Active;
            info!(validator = %v.address_hex(), self_delegation = v.self_delegation, "validator.activated");
        }

        self.delegations.entry(validator).or_default().push(Delegation {
            delegator,
            validator,
            amount,
            shares: amount,
            created_at: now,
        });

        self.recompute_active_set();
        Ok(())
    }

    /// Withdraws `amount` from `delegator`'s delegations to `validator`,
    /// oldest first. Nothing changes when the delegator holds less.
    pub fn undelegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: u64,
    ) -> Result<(), RegistryError> {
        if !self.validators.contains_key(&validator) {
            return Err(RegistryError::UnknownValidator(hex::encode(validator)));
        }
        if amount == 0 {
            return Err(RegistryError::ZeroAmount);
        }

        let records = self.delegations.entry(validator).or_default();
        let held: u64 = records
            .iter()
            .filter(|d| d.delegator == delegator)
            .fold(0u64, |acc, d| acc.saturating_add(d.amount));
        if held < amount {
            return Err(RegistryError::InsufficientDelegation {
                held,
                requested: amount,
            });
        }

        let mut remaining = amount;
        for record in records.iter_mut().filter(|d| d.delegator == delegator) {
            if remaining == 0 {
                break;
            }
            let take = record.amount.min(remaining);
            record.amount -= take;
            record.shares = record.shares.saturating_sub(take);
            remaining -= take;
        }
        records.retain(|d| d.amount > 0);

        if let Some(v) = self.validators.get_mut(&validator) {
            v.total_delegation = v.total_delegation.saturating_sub(amount);
            if delegator == validator {
                v.self_delegation = v.self_delegation.saturating_sub(amount);
            }
            if v.status == ValidatorStatus::Active && !v.meets_self_bond() {
                v.status = ValidatorStatus::Inactive;
                info!(validator = %v.address_hex(), self_delegation = v.self_delegation, "validator.deactivated");
            }
        }

        self.recompute_active_set();
        Ok(())
    }

    /// Jails from any status for `duration`.
    pub fn jail(&mut self, validator: Address, duration: Duration) -> Result<(), RegistryError> {
        let until = self.clock.now_millis().saturating_add(duration_millis(duration));
        let v = self
            .validators
            .get_mut(&validator)
            .ok_or_else(|| RegistryError::UnknownValidator(hex::encode(validator)))?;

        v.status = ValidatorStatus::Jailed;
        v.jailed_until = Some(until);
        v.unbonding_until = None;
        info!(validator = %v.address_hex(), jailed_until = until, "validator.jailed");

        self.recompute_active_set();
        Ok(())
    }

    /// Jails for the configured default duration.
    pub fn jail_default(&mut self, validator: Address) -> Result<(), RegistryError> {
        let duration = self.config.default_jail;
        self.jail(validator, duration)
    }

    /// Lifts a jail whose cooldown has passed. The validator returns to
    /// Active if its self bond still meets the minimum, Inactive otherwise.
    pub fn unjail(&mut self, validator: Address) -> Result<(), RegistryError> {
        let now = self.clock.now_millis();
        let v = self
            .validators
            .get_mut(&validator)
            .ok_or_else(|| RegistryError::UnknownValidator(hex::encode(validator)))?;

        if v.status != ValidatorStatus::Jailed {
            return Err(RegistryError::NotJailed(v.address_hex()));
        }
        if let Some(until) = v.jailed_until {
            if now < until {
                return Err(RegistryError::StillJailed {
                    validator: v.address_hex(),
                    until,
                });
            }
        }

        v.status = if v.meets_self_bond() {
            ValidatorStatus::Active
        } else {
            ValidatorStatus::Inactive
        };
        v.jailed_until = None;
        v.missed_blocks = 0;
        info!(validator = %v.address_hex(), status = %v.status, "validator.unjailed");

        self.recompute_active_set();
        Ok(())
    }

    /// Records whether `validator` signed the latest block. Missing more
    /// than the configured threshold jails it for the downtime period.
    pub fn record_signature(&mut self, validator: Address, signed: bool) -> Result<(), RegistryError> {
        let window_len = self.config.uptime_window.max(1);
        let threshold = self.config.missed_block_threshold;
        let downtime_jail = self.config.downtime_jail;

        let v = self
            .validators
            .get_mut(&validator)
            .ok_or_else(|| RegistryError::UnknownValidator(hex::encode(validator)))?;

        let window = self.signing.entry(validator).or_default();
        window.push_back(signed);
        while window.len() > window_len {
            window.pop_front();
        }
        let signed_count = window.iter().filter(|s| **s).count();
        v.uptime = Rate::saturating_from_num(signed_count as f64 * 100.0 / window.len() as f64);

        if signed {
            return Ok(());
        }

        v.missed_blocks += 1;
        if v.missed_blocks > threshold && v.status != ValidatorStatus::Jailed {
            warn!(
                validator = %v.address_hex(),
                missed_blocks = v.missed_blocks,
                "validator.downtime"
            );
            return self.jail(validator, downtime_jail);
        }
        Ok(())
    }

    /// Changes the commission rate within the validator's max rate and
    /// max change rate.
    pub fn edit_commission(&mut self, validator: Address, new_rate: Rate) -> Result<(), RegistryError> {
        let v = self
            .validators
            .get_mut(&validator)
            .ok_or_else(|| RegistryError::UnknownValidator(hex::encode(validator)))?;

        let commission = &mut v.commission;
        if new_rate < Rate::ZERO || new_rate > commission.max_rate {
            return Err(RegistryError::InvalidCommission(format!(
                "rate {} is outside [0, {}]",
                new_rate, commission.max_rate
            )));
        }
        let change = (new_rate - commission.rate).abs();
        if change > commission.max_change_rate {
            return Err(RegistryError::InvalidCommission(format!(
                "change {} exceeds max change rate {}",
                change, commission.max_change_rate
            )));
        }
        commission.rate = new_rate;
        Ok(())
    }

    /// Starts a voluntary exit. Jailed validators must be unjailed first.
    pub fn begin_unbonding(&mut self, validator: Address) -> Result<(), RegistryError> {
        let until = self
            .clock
            .now_millis()
            .saturating_add(duration_millis(self.config.unbonding_period));
        let v = self
            .validators
            .get_mut(&validator)
            .ok_or_else(|| RegistryError::UnknownValidator(hex::encode(validator)))?;

        if matches!(v.status, ValidatorStatus::Jailed | ValidatorStatus::Unbonding) {
            return Err(RegistryError::InvalidTransition {
                validator: v.address_hex(),
                action: "begin unbonding",
                status: v.status.to_string(),
            });
        }

        v.status = ValidatorStatus::Unbonding;
        v.unbonding_until = Some(until);
        info!(validator = %v.address_hex(), unbonding_until = until, "validator.unbonding");

        self.recompute_active_set();
        Ok(())
    }

    /// Moves validators whose unbonding period has elapsed to Inactive.
    pub fn complete_unbonding(&mut self) -> Vec<Address> {
        let now = self.clock.now_millis();
        let mut completed = Vec::new();
        for v in self.validators.values_mut() {
            if v.status == ValidatorStatus::Unbonding && v.unbonding_until.is_some_and(|t| t <= now) {
                v.status = ValidatorStatus::Inactive;
                v.unbonding_until = None;
                completed.push(v.address);
            }
        }
        if !completed.is_empty() {
            info!(count = completed.len(), "validator.unbonding_completed");
        }
        completed
    }

    /// Next block proposer from the active set, or `None` when it is empty.
    /// Consumes the slot.
    pub fn next_proposer(&mut self) -> Option<Address> {
        let proposer = self.peek_proposer()?;
        self.advance_proposer();
        Some(proposer)
    }

    /// The proposer `next_proposer` would return, without consuming the slot.
    pub fn peek_proposer(&self) -> Option<Address> {
        if self.active_set.is_empty() {
            return None;
        }
        match self.config.proposer_selection {
            ProposerSelection::RoundRobin => Some(self.round_robin_pick()),
            ProposerSelection::StakeWeighted { .. } => {
                let mut rng = self.rng.clone();
                self.stake_weighted_pick(&mut rng)
                    .or_else(|| Some(self.round_robin_pick()))
            }
        }
    }

    /// Moves the rotation past the current slot.
    pub fn advance_proposer(&mut self) {
        if self.active_set.is_empty() {
            return;
        }
        if let ProposerSelection::StakeWeighted { .. } = self.config.proposer_selection {
            let mut rng = self.rng.clone();
            if self.stake_weighted_pick(&mut rng).is_some() {
                self.rng = rng;
                return;
            }
        }
        self.proposer_index = self.proposer_index % self.active_set.len() + 1;
    }

    fn round_robin_pick(&self) -> Address {
        self.active_set[self.proposer_index % self.active_set.len()]
    }

    fn stake_weighted_pick(&self, rng: &mut StdRng) -> Option<Address> {
        let weights: Vec<(Address, u128)> = self
            .active_set
            .iter()
            .filter_map(|a| self.validators.get(a).map(|v| (*a, v.total_delegation as u128)))
            .collect();
        let total: u128 = weights.iter().map(|(_, w)| w).sum();
        if total == 0 {
            return None;
        }

        let mut draw = rng.gen_range(0..total);
        for (address, weight) in weights {
            if draw < weight {
                return Some(address);
            }
            draw -= weight;
        }
        None
    }

    fn recompute_active_set(&mut self) {
        let mut candidates: Vec<&Validator> = self
            .validators
            .values()
            .filter(|v| v.status == ValidatorStatus::Active)
            .collect();
        candidates.sort_by(|a, b| {
            b.total_delegation
                .cmp(&a.total_delegation)
                .then(a.address.cmp(&b.address))
        });

        let active: Vec<Address> = candidates
            .into_iter()
            .take(self.config.max_validators)
            .map(|v| v.address)
            .collect();

        if active != self.active_set {
            info!(size = active.len(), "validator.active_set_changed");
            self.active_set = active;
        }
    }

    pub fn get_validator(&self, address: &Address) -> Option<&Validator> {
        self.validators.get(address)
    }

    pub fn get_active_set(&self) -> &[Address] {
        &self.active_set
    }

    pub fn is_active(&self, address: &Address) -> bool {
        self.active_set.contains(address)
    }

    pub fn validators(&self) -> impl Iterator<Item = &Validator> + '_ {
        self.validators.values()
    }

    pub fn delegations(&self, validator: &Address) -> &[Delegation] {
        self.delegations
            .get(validator)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total_validators: self.validators.len(),
            active_validators: self.active_set.len(),
            ..RegistryStats::default()
        };
        for v in self.validators.values() {
            stats.total_stake = stats.total_stake.saturating_add(v.total_delegation);
            match v.status {
                ValidatorStatus::Jailed => stats.jailed_validators += 1,
                ValidatorStatus::Unbonding => stats.unbonding_validators += 1,
                _ => {}
            }
        }
        stats.active_stake = self
            .active_set
            .iter()
            .filter_map(|a| self.validators.get(a))
            .fold(0u64, |acc, v| acc.saturating_add(v.total_delegation));
        if stats.total_stake > 0 {
            stats.bonded_ratio = stats.active_stake as f64 / stats.total_stake as f64;
        }
        stats
    }
}
