//! Settlement ledger: resource balances, aggregate stats and level.
//!
//! Channels are looked up by name against the schema the catalog declares.
//! Every mutation is crate-private; outside the crate the ledger is read
//! through accessors and snapshots only.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::catalog::{BuildingData, Catalog};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("unknown stat '{0}'")]
    UnknownStat(String),
    #[error("amount for '{resource}' must not be negative, got {amount}")]
    NegativeAmount { resource: String, amount: i64 },
    #[error(transparent)]
    InsufficientResources(#[from] Shortfall),
    #[error("balance of '{0}' would overflow")]
    Overflow(String),
}

/// A cost the ledger cannot cover without dropping below a floor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient {resource}: need {required}, have {available}")]
pub struct Shortfall {
    pub resource: String,
    pub required: i64,
    pub available: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResourceChannel {
    balance: i64,
    floor: Option<i64>,
}

impl ResourceChannel {
    /// Balance a debit may draw down to, or `None` when unbounded.
    fn spendable(&self) -> Option<i64> {
        self.floor.map(|floor| self.balance.saturating_sub(floor))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    resources: BTreeMap<String, ResourceChannel>,
    stats: BTreeMap<String, i64>,
    level: u32,
    level_stat: Option<String>,
}

impl Ledger {
    /// Builds a ledger with every schema channel present. Channels missing
    /// from the starting maps start at zero.
    pub fn new(
        catalog: &Catalog,
        starting_resources: &BTreeMap<String, i64>,
        starting_stats: &BTreeMap<String, i64>,
    ) -> Result<Self, LedgerError> {
        if let Some(key) = starting_resources.keys().find(|key| !catalog.has_resource(key)) {
            return Err(LedgerError::UnknownResource(key.clone()));
        }
        if let Some(key) = starting_stats.keys().find(|key| !catalog.has_stat(key)) {
            return Err(LedgerError::UnknownStat(key.clone()));
        }
        let resources = catalog
            .resources()
            .iter()
            .map(|def| {
                let balance = starting_resources.get(&def.key).copied().unwrap_or(0);
                (
                    def.key.clone(),
                    ResourceChannel {
                        balance,
                        floor: def.floor,
                    },
                )
            })
            .collect();
        let stats = catalog
            .stats()
            .iter()
            .map(|def| (def.key.clone(), starting_stats.get(&def.key).copied().unwrap_or(0)))
            .collect();
        let mut ledger = Self {
            resources,
            stats,
            level: 1,
            level_stat: catalog.level_stat().map(str::to_string),
        };
        ledger.mirror_level();
        Ok(ledger)
    }

    pub fn resource(&self, name: &str) -> Option<i64> {
        self.resources.get(name).map(|channel| channel.balance)
    }

    pub fn stat(&self, name: &str) -> Option<i64> {
        self.stats.get(name).copied()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn resources(&self) -> BTreeMap<String, i64> {
        self.resources
            .iter()
            .map(|(name, channel)| (name.clone(), channel.balance))
            .collect()
    }

    pub fn stats(&self) -> &BTreeMap<String, i64> {
        &self.stats
    }

    /// Checks a whole cost against current balances without touching them.
    /// A resource the schema does not know has nothing to spend.
    pub fn can_afford(&self, cost: &BTreeMap<String, i64>) -> Result<(), Shortfall> {
        for (name, amount) in cost {
            if *amount <= 0 {
                continue;
            }
            let (available, spendable) = match self.resources.get(name) {
                Some(channel) => (channel.balance, channel.spendable()),
                None => (0, Some(0)),
            };
            if spendable.is_some_and(|spendable| *amount > spendable) {
                return Err(Shortfall {
                    resource: name.clone(),
                    required: *amount,
                    available,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn credit_resource(&mut self, name: &str, amount: i64) -> Result<i64, LedgerError> {
        check_amount(name, amount)?;
        let channel = self.channel_mut(name)?;
        channel.balance = channel
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(name.to_string()))?;
        Ok(channel.balance)
    }

    pub(crate) fn debit_resource(&mut self, name: &str, amount: i64) -> Result<i64, LedgerError> {
        check_amount(name, amount)?;
        let channel = self.channel_mut(name)?;
        if let Some(spendable) = channel.spendable() {
            if amount > spendable {
                return Err(Shortfall {
                    resource: name.to_string(),
                    required: amount,
                    available: channel.balance,
                }
                .into());
            }
        }
        channel.balance = channel
            .balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::Overflow(name.to_string()))?;
        Ok(channel.balance)
    }

    /// Debits as much of `amount` as the floor allows and returns what was
    /// actually taken.
    pub(crate) fn debit_saturating(&mut self, name: &str, amount: i64) -> Result<i64, LedgerError> {
        check_amount(name, amount)?;
        let taken = match self.channel(name)?.spendable() {
            Some(spendable) => amount.min(spendable.max(0)),
            None => amount,
        };
        self.debit_resource(name, taken)?;
        Ok(taken)
    }

    /// Debits every entry of `cost`, or nothing if any entry cannot be paid.
    pub(crate) fn debit_all(&mut self, cost: &BTreeMap<String, i64>) -> Result<(), Shortfall> {
        self.can_afford(cost)?;
        for (name, amount) in cost {
            if let Some(channel) = self.resources.get_mut(name) {
                channel.balance -= (*amount).max(0);
            }
        }
        Ok(())
    }

    pub(crate) fn apply_completion_bonuses(&mut self, catalog: &Catalog, building: &BuildingData) {
        for (stat, delta) in catalog.contributions(building) {
            *self.stats.entry(stat).or_insert(0) += delta;
        }
    }

    pub(crate) fn reverse_completion_bonuses(&mut self, catalog: &Catalog, building: &BuildingData) {
        for (stat, delta) in catalog.contributions(building) {
            *self.stats.entry(stat).or_insert(0) -= delta;
        }
    }

    /// Raises the level; the level never goes down. Returns true on change.
    pub(crate) fn raise_level(&mut self, level: u32) -> bool {
        if level > self.level {
            self.level = level;
            self.mirror_level();
            true
        } else {
            false
        }
    }

    fn mirror_level(&mut self) {
        if let Some(stat) = &self.level_stat {
            self.stats.insert(stat.clone(), i64::from(self.level));
        }
    }

    fn channel(&self, name: &str) -> Result<&ResourceChannel, LedgerError> {
        self.resources
            .get(name)
            .ok_or_else(|| LedgerError::UnknownResource(name.to_string()))
    }

    fn channel_mut(&mut self, name: &str) -> Result<&mut ResourceChannel, LedgerError> {
        self.resources
            .get_mut(name)
            .ok_or_else(|| LedgerError::UnknownResource(name.to_string()))
    }
}

fn check_amount(name: &str, amount: i64) -> Result<(), LedgerError> {
    if amount < 0 {
        Err(LedgerError::NegativeAmount {
            resource: name.to_string(),
            amount,
        })
    } else {
        Ok(())
    }
}
