//! Root bundle proposals.

use std::collections::BTreeSet;

use hubledger_merkle::{ClaimBitmapTracker, ClaimTracker};
use hubledger_types::{Address, ChainId, ClaimBitmapKind, Hash256, LeafId, Result, Timestamp};

/// Where a proposal stands relative to the clock and its executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundlePhase {
    /// No proposal, or the last one has fully executed.
    Empty,
    /// Challenge window open; disputable, not executable.
    Pending,
    /// Window closed, no leaf executed yet. The window end itself already
    /// belongs here; disputes are accepted only before it.
    Executable,
    PartiallyExecuted,
}

/// The roots to be committed, as submitted by a proposer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedRoots {
    pub bundle_evaluation_block_numbers: Vec<u64>,
    pub pool_rebalance_leaf_count: u32,
    pub pool_rebalance_root: Hash256,
    pub relayer_refund_root: Hash256,
    pub slow_relay_root: Hash256,
}

/// The single live root bundle proposal.
#[derive(Debug, Clone)]
pub struct RootBundleProposal {
    pub challenge_period_end: Timestamp,
    pub bundle_evaluation_block_numbers: Vec<u64>,
    pub pool_rebalance_root: Hash256,
    pub relayer_refund_root: Hash256,
    pub slow_relay_root: Hash256,
    pub leaf_count: u32,
    pub unclaimed_leaf_count: u32,
    pub claims: ClaimBitmapTracker,
    pub proposer: Address,
    /// Bond taken from the proposer, finality fee included.
    pub bond_posted: u128,
    /// Oracle finality fee at proposal time.
    pub final_fee_snapshot: u128,
    pub bond_repaid: bool,
    /// Destinations that already received this bundle's roots.
    pub roots_relayed_to: BTreeSet<ChainId>,
}

impl RootBundleProposal {
    #[must_use]
    pub fn new(
        roots: ProposedRoots,
        proposer: Address,
        challenge_period_end: Timestamp,
        bond_posted: u128,
        final_fee_snapshot: u128,
        bitmap: ClaimBitmapKind,
    ) -> Self {
        Self {
            challenge_period_end,
            bundle_evaluation_block_numbers: roots.bundle_evaluation_block_numbers,
            pool_rebalance_root: roots.pool_rebalance_root,
            relayer_refund_root: roots.relayer_refund_root,
            slow_relay_root: roots.slow_relay_root,
            leaf_count: roots.pool_rebalance_leaf_count,
            unclaimed_leaf_count: roots.pool_rebalance_leaf_count,
            claims: ClaimBitmapTracker::new(bitmap),
            proposer,
            bond_posted,
            final_fee_snapshot,
            bond_repaid: false,
            roots_relayed_to: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn phase(&self, now: Timestamp) -> BundlePhase {
        if self.unclaimed_leaf_count == 0 {
            BundlePhase::Empty
        } else if now < self.challenge_period_end {
            BundlePhase::Pending
        } else if self.unclaimed_leaf_count == self.leaf_count {
            BundlePhase::Executable
        } else {
            BundlePhase::PartiallyExecuted
        }
    }

    pub fn is_claimed(&self, leaf: LeafId) -> Result<bool> {
        self.claims.is_claimed(leaf.0)
    }

    /// Bond excluding the finality fee.
    #[must_use]
    pub fn bond_amount(&self) -> u128 {
        self.bond_posted.saturating_sub(self.final_fee_snapshot)
    }

    /// Flat `key:value` summary forwarded to the oracle with a dispute.
    #[must_use]
    pub fn ancillary_data(&self) -> String {
        [
            format!("challenge_period_end:{}", self.challenge_period_end),
            format!("pool_rebalance_leaf_count:{}", self.unclaimed_leaf_count),
            format!("pool_rebalance_root:{}", self.pool_rebalance_root.to_hex()),
            format!("relayer_refund_root:{}", self.relayer_refund_root.to_hex()),
            format!("slow_relay_root:{}", self.slow_relay_root.to_hex()),
            format!("claimed_bitmap:{}", self.claims.snapshot_hex()),
            format!("proposer:{}", self.proposer.to_hex()),
        ]
        .join(",")
    }
}
