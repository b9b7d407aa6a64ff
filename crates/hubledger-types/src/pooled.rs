//! Per-asset pool accounting state.

use serde::{Deserialize, Serialize};

use crate::{Asset, LpTokenId, Timestamp};

/// Reserve accounting for one pooled asset.
///
/// `liquid_reserves` is what the hub holds and can lend out right now.
/// `utilized_reserves` is what is out on destination chains, plus LP fees
/// that are owed back to the pool. Either may go negative transiently:
/// a leaf returning more than was sent drives `utilized_reserves` below zero,
/// and an owner haircut can do the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PooledTokenState {
    pub asset: Asset,
    pub lp_token: LpTokenId,
    pub is_enabled: bool,
    pub liquid_reserves: i128,
    pub utilized_reserves: i128,
    pub undistributed_lp_fees: u128,
    pub last_lp_fee_update: Timestamp,
}

impl PooledTokenState {
    /// Fresh, enabled pool state with zero reserves.
    #[must_use]
    pub fn new(asset: Asset, now: Timestamp) -> Self {
        Self {
            asset,
            lp_token: LpTokenId::for_asset(asset),
            is_enabled: true,
            liquid_reserves: 0,
            utilized_reserves: 0,
            undistributed_lp_fees: 0,
            last_lp_fee_update: now,
        }
    }

    /// `liquid + utilized - undistributed`: the value backing LP shares.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub fn backing_value(&self) -> Option<i128> {
        let undistributed = i128::try_from(self.undistributed_lp_fees).ok()?;
        self.liquid_reserves
            .checked_add(self.utilized_reserves)?
            .checked_sub(undistributed)
    }
}
