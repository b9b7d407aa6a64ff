//! # hubledger-types
//!
//! Shared types, errors, and configuration for the **hubledger** settlement hub.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`ChainId`], [`Hash256`], [`LeafId`], [`Timestamp`], [`RequestHandle`], [`LpTokenId`]
//! - **Leaf schemas**: [`PoolRebalanceLeaf`], [`RelayerRefundLeaf`], [`SlowFillLeaf`]
//! - **Pool model**: [`PooledTokenState`], [`Asset`]
//! - **Events**: [`HubEvent`]
//! - **Configuration**: [`HubConfig`], [`ClaimBitmapKind`]
//! - **Time**: [`Clock`], [`SystemClock`], [`ManualClock`]
//! - **Fixed point**: [`fixed_point`] helpers over `rust_decimal`
//! - **Errors**: [`HubError`] with `HL_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod fixed_point;
pub mod ids;
pub mod leaf;
pub mod pooled;

// Re-export all primary types at crate root for ergonomic imports:
//   use hubledger_types::{Address, HubError, PoolRebalanceLeaf, ...};

pub use clock::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use leaf::*;
pub use pooled::*;

// Constants and fixed-point helpers are accessed via their module path
// (`hubledger_types::constants::FOO`, `hubledger_types::fixed_point::ratio`).
