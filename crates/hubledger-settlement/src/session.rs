//! Bundle lifecycle state owned by one hub.
//!
//! ```text
//! Empty ──propose──► Pending ──(window ends)──► Executable ──execute──► PartiallyExecuted ──last leaf──► Empty
//!                       │                                                                                ▲
//!                       └──dispute──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session enforces the timing and exactly-once rules. Bond and ledger
//! effects are applied by the hub around these transitions.

use std::collections::BTreeMap;

use hubledger_merkle::{ClaimTracker, claim};
use hubledger_types::{Address, HubError, LeafId, RequestHandle, Result, Timestamp};

use crate::proposal::{BundlePhase, RootBundleProposal};

/// A dispute forwarded to the oracle and awaiting its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeRecord {
    pub proposer: Address,
    pub disputer: Address,
    /// Stake each side has at the oracle.
    pub stake: u128,
    pub final_fee: u128,
    pub disputed_at: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct BundleSession {
    proposal: Option<RootBundleProposal>,
    disputes: BTreeMap<RequestHandle, DisputeRecord>,
}

impl BundleSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn proposal(&self) -> Option<&RootBundleProposal> {
        self.proposal.as_ref()
    }

    #[must_use]
    pub fn phase(&self, now: Timestamp) -> BundlePhase {
        self.proposal
            .as_ref()
            .map_or(BundlePhase::Empty, |p| p.phase(now))
    }

    /// Fail unless a new proposal may replace the current one.
    pub fn ensure_can_propose(&self) -> Result<()> {
        match &self.proposal {
            Some(p) if p.unclaimed_leaf_count > 0 => Err(HubError::ProposalHasUnclaimedLeaves {
                remaining: p.unclaimed_leaf_count,
            }),
            _ => Ok(()),
        }
    }

    /// Install `proposal`, replacing a fully executed one.
    pub fn install(&mut self, proposal: RootBundleProposal) -> Result<()> {
        self.ensure_can_propose()?;
        self.proposal = Some(proposal);
        Ok(())
    }

    /// The proposal, if it can still be disputed at `now`. The window is
    /// `[proposed_at, challenge_period_end)`.
    pub fn disputable(&self, now: Timestamp) -> Result<&RootBundleProposal> {
        let proposal = self.proposal.as_ref().ok_or(HubError::NoPendingProposal)?;
        if now >= proposal.challenge_period_end {
            return Err(HubError::ChallengePeriodElapsed {
                ended_at: proposal.challenge_period_end,
                now,
            });
        }
        Ok(proposal)
    }

    /// The proposal, if `leaf` may execute at `now`: the window has closed,
    /// some leaf is still outstanding, and `leaf` itself is unclaimed.
    pub fn executable(&self, leaf: LeafId, now: Timestamp) -> Result<&RootBundleProposal> {
        let proposal = self.proposal.as_ref().ok_or(HubError::NoPendingProposal)?;
        if now < proposal.challenge_period_end {
            return Err(HubError::ChallengePeriodActive {
                ends_at: proposal.challenge_period_end,
                now,
            });
        }
        if proposal.unclaimed_leaf_count == 0 {
            return Err(HubError::ProposalFullyExecuted);
        }
        if proposal.claims.is_claimed(leaf.0)? {
            return Err(HubError::LeafAlreadyClaimed(leaf));
        }
        Ok(proposal)
    }

    /// Claim `leaf` and decrement the unclaimed count. Returns the
    /// remaining count.
    pub fn record_execution(&mut self, leaf: LeafId) -> Result<u32> {
        let proposal = self.proposal.as_mut().ok_or(HubError::NoPendingProposal)?;
        let remaining = proposal
            .unclaimed_leaf_count
            .checked_sub(1)
            .ok_or(HubError::ProposalFullyExecuted)?;
        claim(&mut proposal.claims, leaf)?;
        proposal.unclaimed_leaf_count = remaining;
        Ok(remaining)
    }

    pub fn proposal_mut(&mut self) -> Option<&mut RootBundleProposal> {
        self.proposal.as_mut()
    }

    /// Remove the proposal.
    pub fn take(&mut self) -> Option<RootBundleProposal> {
        self.proposal.take()
    }

    pub fn record_dispute(&mut self, handle: RequestHandle, record: DisputeRecord) {
        self.disputes.insert(handle, record);
    }

    #[must_use]
    pub fn dispute(&self, handle: RequestHandle) -> Option<&DisputeRecord> {
        self.disputes.get(&handle)
    }

    pub fn close_dispute(&mut self, handle: RequestHandle) -> Result<DisputeRecord> {
        self.disputes
            .remove(&handle)
            .ok_or(HubError::DisputeNotFound(handle))
    }

    pub fn open_disputes(&self) -> impl Iterator<Item = (&RequestHandle, &DisputeRecord)> {
        self.disputes.iter()
    }
}

#[cfg(test)]
mod tests {
    use hubledger_types::{ClaimBitmapKind, Hash256};

    use super::*;
    use crate::proposal::ProposedRoots;

    fn proposal(leaves: u32) -> RootBundleProposal {
        RootBundleProposal::new(
            ProposedRoots {
                bundle_evaluation_block_numbers: vec![1],
                pool_rebalance_leaf_count: leaves,
                pool_rebalance_root: Hash256([1; 32]),
                relayer_refund_root: Hash256([2; 32]),
                slow_relay_root: Hash256([3; 32]),
            },
            Address::from_low_u64(1),
            Timestamp(100),
            10,
            0,
            ClaimBitmapKind::WordIndexed,
        )
    }

    #[test]
    fn empty_session_rejects_dispute_and_execution() {
        let s = BundleSession::new();
        assert_eq!(s.phase(Timestamp(0)), BundlePhase::Empty);
        assert!(matches!(s.disputable(Timestamp(0)), Err(HubError::NoPendingProposal)));
        assert!(matches!(
            s.executable(LeafId(0), Timestamp(0)),
            Err(HubError::NoPendingProposal)
        ));
    }

    #[test]
    fn window_boundaries() {
        let mut s = BundleSession::new();
        s.install(proposal(1)).unwrap();
        assert!(s.disputable(Timestamp(99)).is_ok());
        assert!(matches!(
            s.executable(LeafId(0), Timestamp(99)),
            Err(HubError::ChallengePeriodActive { .. })
        ));
        // The windows meet at the end timestamp without overlapping.
        assert!(matches!(
            s.disputable(Timestamp(100)),
            Err(HubError::ChallengePeriodElapsed { .. })
        ));
        assert!(s.executable(LeafId(0), Timestamp(100)).is_ok());
    }

    #[test]
    fn fully_executed_proposal_rejects_spare_leaves() {
        let mut s = BundleSession::new();
        s.install(proposal(1)).unwrap();
        assert_eq!(s.record_execution(LeafId(0)).unwrap(), 0);

        // Leaf 1 was never claimed, but the proposal has nothing left.
        assert!(matches!(
            s.executable(LeafId(1), Timestamp(100)),
            Err(HubError::ProposalFullyExecuted)
        ));
        assert!(matches!(
            s.record_execution(LeafId(1)),
            Err(HubError::ProposalFullyExecuted)
        ));
        let p = s.proposal().unwrap();
        assert_eq!(p.unclaimed_leaf_count, 0);
        assert!(!p.claims.is_claimed(1).unwrap());
    }

    #[test]
    fn execution_is_exactly_once() {
        let mut s = BundleSession::new();
        s.install(proposal(2)).unwrap();
        assert_eq!(s.record_execution(LeafId(1)).unwrap(), 1);
        assert!(matches!(
            s.executable(LeafId(1), Timestamp(100)),
            Err(HubError::LeafAlreadyClaimed(LeafId(1)))
        ));
        assert!(matches!(
            s.record_execution(LeafId(1)),
            Err(HubError::LeafAlreadyClaimed(_))
        ));
        assert!(matches!(
            s.install(proposal(1)),
            Err(HubError::ProposalHasUnclaimedLeaves { remaining: 1 })
        ));
        assert_eq!(s.record_execution(LeafId(0)).unwrap(), 0);
        assert_eq!(s.phase(Timestamp(100)), BundlePhase::Empty);
        s.install(proposal(1)).unwrap();
        assert!(!s.proposal().unwrap().is_claimed(LeafId(1)).unwrap());
    }

    #[test]
    fn disputes_close_once() {
        let mut s = BundleSession::new();
        let handle = RequestHandle::new();
        s.record_dispute(
            handle,
            DisputeRecord {
                proposer: Address::from_low_u64(1),
                disputer: Address::from_low_u64(2),
                stake: 10,
                final_fee: 1,
                disputed_at: Timestamp(5),
            },
        );
        assert_eq!(s.open_disputes().count(), 1);
        assert_eq!(s.close_dispute(handle).unwrap().stake, 10);
        assert!(matches!(
            s.close_dispute(handle),
            Err(HubError::DisputeNotFound(_))
        ));
    }
}
