//! Bond custody.
//!
//! Proposer and disputer bonds move through three buckets:
//!
//! ```text
//! post() ──► held ──release_to()──────────────► credits[account]
//!             │
//!             └─forward_to_oracle()─► at_oracle ──settle_from_oracle()──► credits[winner]
//!                                                                   └──► oracle_retained
//! ```
//!
//! Credits are withdrawn by their owner. Every method checks the source
//! bucket before moving anything.

use std::collections::BTreeMap;

use hubledger_types::{Address, HubError, Result};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct BondEscrow {
    held: u128,
    at_oracle: u128,
    oracle_retained: u128,
    credits: BTreeMap<Address, u128>,
}

fn insufficient(requested: u128, available: u128) -> HubError {
    HubError::InsufficientEscrow {
        requested,
        available,
    }
}

impl BondEscrow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `amount` from `from` into custody.
    pub fn post(&mut self, from: Address, amount: u128) -> Result<()> {
        self.held = self
            .held
            .checked_add(amount)
            .ok_or(HubError::ArithmeticOverflow { context: "bond escrow" })?;
        debug!(%from, amount, held = self.held, "bond posted");
        Ok(())
    }

    /// Fail unless at least `amount` is held.
    pub fn ensure_held(&self, amount: u128) -> Result<()> {
        if amount > self.held {
            return Err(insufficient(amount, self.held));
        }
        Ok(())
    }

    /// Return `amount` of held bond to `to`.
    pub fn release_to(&mut self, to: Address, amount: u128) -> Result<()> {
        self.ensure_held(amount)?;
        self.held -= amount;
        self.credit(to, amount);
        debug!(%to, amount, held = self.held, "bond released");
        Ok(())
    }

    /// Hand `amount` of held bond to the oracle.
    pub fn forward_to_oracle(&mut self, amount: u128) -> Result<()> {
        if amount > self.held {
            return Err(insufficient(amount, self.held));
        }
        self.held -= amount;
        self.at_oracle += amount;
        Ok(())
    }

    /// The oracle returns `returned` stakes and pays `payout` of them to
    /// `winner`, keeping the rest.
    pub fn settle_from_oracle(&mut self, winner: Address, returned: u128, payout: u128) -> Result<()> {
        if returned > self.at_oracle {
            return Err(insufficient(returned, self.at_oracle));
        }
        if payout > returned {
            return Err(insufficient(payout, returned));
        }
        self.at_oracle -= returned;
        self.oracle_retained += returned - payout;
        self.credit(winner, payout);
        Ok(())
    }

    fn credit(&mut self, to: Address, amount: u128) {
        if amount > 0 {
            *self.credits.entry(to).or_default() += amount;
        }
    }

    /// Pay out everything credited to `account`.
    pub fn withdraw(&mut self, account: Address) -> u128 {
        self.credits.remove(&account).unwrap_or(0)
    }

    #[must_use]
    pub fn credit_of(&self, account: Address) -> u128 {
        self.credits.get(&account).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn held(&self) -> u128 {
        self.held
    }

    #[must_use]
    pub fn at_oracle(&self) -> u128 {
        self.at_oracle
    }

    #[must_use]
    pub fn oracle_retained(&self) -> u128 {
        self.oracle_retained
    }
}
