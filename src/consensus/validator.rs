//! Validator and delegation records

use crate::crypto::Address;
use crate::error::RegistryError;
use fixed::types::I32F32;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point rate used for commissions and uptime.
pub type Rate = I32F32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    Inactive,
    Active,
    Jailed,
    Unbonding,
}

impl fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ValidatorStatus::Inactive => "inactive",
            ValidatorStatus::Active => "active",
            ValidatorStatus::Jailed => "jailed",
            ValidatorStatus::Unbonding => "unbonding",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub moniker: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub rate: Rate,
    pub max_rate: Rate,
    pub max_change_rate: Rate,
}

impl Commission {
    /// Max rate is twice the starting rate capped at 1; each edit may move
    /// the rate by at most 0.01.
    pub fn new(rate: Rate) -> Result<Self, RegistryError> {
        if rate < Rate::ZERO || rate > Rate::ONE {
            return Err(RegistryError::InvalidCommission(format!(
                "rate {} is outside [0, 1]",
                rate
            )));
        }
        Ok(Commission {
            rate,
            max_rate: rate.saturating_mul_int(2).min(Rate::ONE),
            max_change_rate: Rate::from_num(0.01),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub pub_key: Vec<u8>,
    pub description: Description,
    pub commission: Commission,
    pub min_self_delegation: u64,
    pub self_delegation: u64,
    /// Self-delegation plus delegations from others
    pub total_delegation: u64,
    pub status: ValidatorStatus,
    pub jailed_until: Option<u64>,
    pub unbonding_until: Option<u64>,
    pub missed_blocks: u64,
    /// Percentage of signed blocks over the rolling window
    pub uptime: Rate,
    pub license: Option<String>,
    pub created_at: u64,
}

impl Validator {
    pub fn meets_self_bond(&self) -> bool {
        self.self_delegation >= self.min_self_delegation
    }

    pub fn is_jailed_at(&self, now: u64) -> bool {
        self.status == ValidatorStatus::Jailed && self.jailed_until.is_some_and(|until| now < until)
    }

    /// Whether the validator may hold Active status at `now`.
    pub fn is_eligible(&self, now: u64) -> bool {
        self.meets_self_bond() && !self.is_jailed_at(now)
    }

    pub fn address_hex(&self) -> String {
        hex::encode(self.address)
    }
}

/// Stake bonded by `delegator` to `validator`. Shares are issued 1:1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: Address,
    pub validator: Address,
    pub amount: u64,
    pub shares: u64,
    pub created_at: u64,
}

/// Input to `ValidatorRegistry::register`.
#[derive(Debug, Clone)]
pub struct ValidatorRegistration {
    pub address: Address,
    pub pub_key: Vec<u8>,
    pub commission_rate: Rate,
    pub min_self_delegation: u64,
    pub description: Description,
    pub license: Option<String>,
}

impl ValidatorRegistration {
    pub fn new(address: Address, pub_key: Vec<u8>, commission_rate: Rate, min_self_delegation: u64) -> Self {
        Self {
            address,
            pub_key,
            commission_rate,
            min_self_delegation,
            description: Description::default(),
            license: None,
        }
    }

    pub fn with_description(mut self, description: Description) -> Self {
        self.description = description;
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }
}
