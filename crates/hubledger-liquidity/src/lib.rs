//! # hubledger-liquidity
//!
//! Pooled reserve bookkeeping for the hub.
//!
//! ## Model
//!
//! For every enabled asset the ledger keeps:
//! 1. **liquid reserves**: tokens on the hub available to lend out
//! 2. **utilized reserves**: tokens out on destination chains, plus LP fees owed back
//! 3. **undistributed LP fees**: fees not yet released into the exchange rate
//!
//! ```text
//! exchange_rate = (liquid + utilized - undistributed) / lp_supply
//! utilization   = (relayed + max(utilized, 0)) / (liquid + max(utilized, 0))
//! ```
//!
//! Undistributed fees are released linearly over time by [`LiquidityLedger::sync`],
//! so the exchange rate never jumps when a bundle executes.

pub mod ledger;
pub mod shares;

pub use ledger::{AssetBook, FeeCapture, FeeSchedule, LedgerTransaction, LiquidityLedger, StagedLedger};
pub use shares::LpShareLedger;
