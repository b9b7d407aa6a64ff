//! LP share balances.
//!
//! Tracks per-(LP token, holder) balances and the total supply of each LP
//! token. Mutations are atomic: a failed burn leaves balances unchanged.

use std::collections::HashMap;

use hubledger_types::{Address, HubError, LpTokenId, Result};

/// Balances and supply for every LP token the hub has minted.
#[derive(Debug, Clone, Default)]
pub struct LpShareLedger {
    balances: HashMap<(LpTokenId, Address), u128>,
    supply: HashMap<LpTokenId, u128>,
}

impl LpShareLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, token: LpTokenId, holder: Address, amount: u128) -> Result<()> {
        let supply = self.supply.entry(token).or_default();
        let new_supply = supply
            .checked_add(amount)
            .ok_or(HubError::ArithmeticOverflow {
                context: "lp supply",
            })?;
        *supply = new_supply;
        *self.balances.entry((token, holder)).or_default() += amount;
        Ok(())
    }

    /// Burn `amount` of `holder`'s shares.
    ///
    /// # Errors
    /// `InsufficientShares` if the holder owns fewer than `amount`.
    pub fn burn(&mut self, token: LpTokenId, holder: Address, amount: u128) -> Result<()> {
        self.ensure_balance(token, holder, amount)?;
        if let Some(balance) = self.balances.get_mut(&(token, holder)) {
            *balance -= amount;
        }
        if let Some(supply) = self.supply.get_mut(&token) {
            *supply -= amount;
        }
        Ok(())
    }

    /// Fail unless `holder` owns at least `amount` shares.
    pub fn ensure_balance(&self, token: LpTokenId, holder: Address, amount: u128) -> Result<()> {
        let available = self.balance_of(token, holder);
        if available < amount {
            return Err(HubError::InsufficientShares {
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn balance_of(&self, token: LpTokenId, holder: Address) -> u128 {
        self.balances.get(&(token, holder)).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_supply(&self, token: LpTokenId) -> u128 {
        self.supply.get(&token).copied().unwrap_or(0)
    }
}
