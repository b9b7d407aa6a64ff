//! # hubledger-settlement
//!
//! **Bundle lifecycle**: bonded root bundle proposals, oracle-backed
//! disputes, and exactly-once leaf execution against pooled liquidity.
//!
//! ## Architecture
//!
//! [`HubPool`] owns one [`BundleSession`] and drives it:
//! 1. A proposer bonds `bond_amount + final_fee` and commits three roots
//! 2. During the challenge window anyone may dispute; the oracle decides
//! 3. After the window each pool rebalance leaf executes once, with proof
//! 4. Executing a leaf updates the liquidity ledger and relays tokens and
//!    roots to the destination chain through its [`CrossChainAdapter`]
//! 5. The last leaf returns the bond
//!
//! External calls (oracle, adapters) happen before state is written, and
//! every entry point holds the [`ReentrancyGuard`].

pub mod adapter;
pub mod bond;
pub mod guard;
pub mod hub;
pub mod oracle;
pub mod proposal;
pub mod session;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use adapter::{
    AdapterRegistry, CrossChainAdapter, RelayInstruction, RelayPlan, RootBundleMessage, TokenRelay,
};
pub use bond::BondEscrow;
pub use guard::{GuardToken, ReentrancyGuard};
pub use hub::{DisputeOutcome, DisputeResolution, HubPool};
pub use oracle::{TruthOracle, Verdict, VerdictRequest};
pub use proposal::{BundlePhase, ProposedRoots, RootBundleProposal};
pub use session::{BundleSession, DisputeRecord};
