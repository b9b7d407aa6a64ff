//! End-to-end tests of the hub: proposal, dispute, execution and pooled
//! liquidity working together.
//!
//! Every test builds its own [`Harness`] around a fresh `HubPool`, a manual
//! clock, a mock oracle and recording adapters, so tests never share state.

use std::sync::Arc;

use hubledger_merkle::{ClaimTracker, MerkleTree};
use hubledger_settlement::{
    BundlePhase, DisputeOutcome, HubPool, ProposedRoots, RootBundleMessage,
    testing::{AdapterCall, MockOracle, RecordingAdapter},
};
use hubledger_types::{
    Address, Asset, ChainId, ClaimBitmapKind, Hash256, HubConfig, HubError, HubEvent,
    HubEventKind, LeafId, ManualClock, PoolRebalanceLeaf, PooledTokenState, Timestamp, constants,
};
use rand::Rng;
use rust_decimal::Decimal;

const WEI: u128 = 1_000_000_000_000_000_000;
const FINAL_FEE: u128 = WEI / 10;
const DAY: u64 = 24 * 60 * 60;
const OPTIMISM: ChainId = ChainId(10);
const POLYGON: ChainId = ChainId(137);
const START: Timestamp = Timestamp(1_700_000_000);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn spoke_pool(chain: ChainId) -> Address {
    Address::from_low_u64(0x5000 + chain.0)
}

fn l2_token(chain: ChainId) -> Address {
    Address::from_low_u64(0x7000 + chain.0)
}

/// Hub plus handles on everything it talks to.
struct Harness {
    hub: HubPool,
    clock: ManualClock,
    oracle: MockOracle,
    optimism: RecordingAdapter,
    polygon: RecordingAdapter,
    owner: Address,
    proposer: Address,
    disputer: Address,
    lp: Address,
    weth: Asset,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Hub with WETH enabled, routed to two destinations, and 1000 WETH of
    /// liquidity from `lp`.
    fn with_config(tweak: impl FnOnce(&mut HubConfig)) -> Self {
        init_tracing();
        let owner = Address::from_low_u64(0x01);
        let weth = Address::from_low_u64(0xeeee);
        let mut config = HubConfig::new(owner, weth);
        config.wrapped_native_asset = Some(weth);
        tweak(&mut config);

        let clock = ManualClock::new(START);
        let oracle = MockOracle::new(FINAL_FEE);
        let mut hub = HubPool::new(config, Arc::new(clock.clone()), Box::new(oracle.clone())).unwrap();

        let optimism = RecordingAdapter::new("optimism");
        let polygon = RecordingAdapter::new("polygon");
        hub.set_cross_chain_contracts(owner, OPTIMISM, Box::new(optimism.clone()), spoke_pool(OPTIMISM))
            .unwrap();
        hub.set_cross_chain_contracts(owner, POLYGON, Box::new(polygon.clone()), spoke_pool(POLYGON))
            .unwrap();
        for chain in [OPTIMISM, POLYGON] {
            hub.set_pool_rebalance_route(owner, chain, weth, l2_token(chain)).unwrap();
        }
        hub.enable_l1_token_for_liquidity(owner, weth).unwrap();

        let lp = Address::from_low_u64(0x1111);
        hub.add_liquidity(lp, weth, 1_000 * WEI, false).unwrap();

        Self {
            hub,
            clock,
            oracle,
            optimism,
            polygon,
            owner,
            proposer: Address::from_low_u64(0x2222),
            disputer: Address::from_low_u64(0x3333),
            lp,
            weth,
        }
    }

    fn leaf(&self, id: u32, chain: ChainId, lp_fee: u128, net_send: i128) -> PoolRebalanceLeaf {
        PoolRebalanceLeaf {
            destination_chain_id: chain,
            group_index: 0,
            leaf_id: LeafId(id),
            l1_tokens: vec![self.weth],
            bundle_lp_fees: vec![lp_fee],
            net_send_amounts: vec![net_send],
            running_balances: vec![net_send],
        }
    }

    fn propose(&mut self, leaves: &[PoolRebalanceLeaf]) -> MerkleTree {
        self.propose_counted(leaves, u32::try_from(leaves.len()).unwrap())
    }

    /// Propose a tree over `leaves` that claims only `leaf_count` of them.
    fn propose_counted(&mut self, leaves: &[PoolRebalanceLeaf], leaf_count: u32) -> MerkleTree {
        let tree = MerkleTree::from_leaves(leaves);
        let roots = ProposedRoots {
            bundle_evaluation_block_numbers: vec![3117, 3118],
            pool_rebalance_leaf_count: leaf_count,
            pool_rebalance_root: tree.root(),
            relayer_refund_root: Hash256([0xbb; 32]),
            slow_relay_root: Hash256([0xcc; 32]),
        };
        self.hub.propose_root_bundle(self.proposer, roots).unwrap();
        tree
    }

    fn pass_liveness(&self) {
        self.clock.advance(constants::DEFAULT_LIVENESS_SECS);
    }

    fn execute(&mut self, tree: &MerkleTree, leaf: &PoolRebalanceLeaf) -> Result<(), HubError> {
        let proof = tree.proof(leaf).unwrap();
        let caller = self.owner;
        self.hub.execute_root_bundle(caller, leaf, &proof)
    }

    fn rate(&mut self) -> Decimal {
        self.hub.exchange_rate_current(self.weth).unwrap()
    }

    fn state(&self) -> PooledTokenState {
        self.hub.pooled_token(self.weth).unwrap().clone()
    }

    fn bond(&self) -> u128 {
        constants::DEFAULT_BOND_AMOUNT + FINAL_FEE
    }

    fn kinds(&self) -> Vec<HubEventKind> {
        self.hub.events().iter().map(HubEvent::kind).collect()
    }
}

// =========================================================================
// Execution
// =========================================================================

#[test]
fn fees_from_executed_leaf_smear_into_exchange_rate() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, 10 * WEI, 100 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();
    h.execute(&tree, &leaf).unwrap();

    let s = h.state();
    assert_eq!(s.liquid_reserves, 900 * WEI as i128);
    assert_eq!(s.utilized_reserves, 110 * WEI as i128);
    assert_eq!(s.undistributed_lp_fees, 10 * WEI);
    assert_eq!(h.rate(), Decimal::ONE);

    h.clock.advance(100);
    assert_eq!(h.rate(), dec("1.0000015"));
    h.clock.advance(2 * DAY);
    assert_eq!(h.rate(), dec("1.0025931112"));
    h.clock.advance(10 * DAY);
    assert_eq!(h.rate(), dec("1.01"));
    assert_eq!(h.state().undistributed_lp_fees, 0);

    // 100 WETH went out to the destination together with the roots.
    let calls = h.optimism.calls();
    assert_eq!(calls.len(), 2);
    let AdapterCall::Tokens(relay) = &calls[0] else {
        panic!("expected a token relay first");
    };
    assert_eq!(relay.amount, 100 * WEI);
    assert_eq!(relay.l2_token, l2_token(OPTIMISM));
    assert_eq!(relay.to, spoke_pool(OPTIMISM));
    assert_eq!(h.hub.ledger().vault_balance(h.weth), 900 * WEI);
}

#[test]
fn leaf_executes_exactly_once() {
    let mut h = Harness::new();
    let leaves = [
        h.leaf(0, OPTIMISM, WEI, 10 * WEI as i128),
        h.leaf(1, OPTIMISM, WEI, 20 * WEI as i128),
    ];
    let tree = h.propose(&leaves);
    h.pass_liveness();
    h.execute(&tree, &leaves[0]).unwrap();

    let state = h.state();
    let events = h.hub.events().len();
    assert!(matches!(
        h.execute(&tree, &leaves[0]),
        Err(HubError::LeafAlreadyClaimed(LeafId(0)))
    ));
    assert_eq!(h.state(), state);
    assert_eq!(h.hub.events().len(), events);
    assert!(h.hub.is_leaf_claimed(LeafId(0)).unwrap());
    assert!(!h.hub.is_leaf_claimed(LeafId(1)).unwrap());
    assert_eq!(h.hub.phase(), BundlePhase::PartiallyExecuted);
}

#[test]
fn execution_waits_for_challenge_window() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, 0, 0);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.clock.advance(constants::DEFAULT_LIVENESS_SECS - 1);
    assert_eq!(h.hub.phase(), BundlePhase::Pending);
    assert!(matches!(
        h.execute(&tree, &leaf),
        Err(HubError::ChallengePeriodActive { .. })
    ));
    h.clock.advance(1);
    assert_eq!(h.hub.phase(), BundlePhase::Executable);
    h.execute(&tree, &leaf).unwrap();
}

#[test]
fn dispute_and_execution_windows_do_not_overlap() {
    let end = constants::DEFAULT_LIVENESS_SECS;
    // (seconds after proposal, phase, dispute accepted)
    let cases = [
        (end - 1, BundlePhase::Pending, true),
        (end, BundlePhase::Executable, false),
        (end + 1, BundlePhase::Executable, false),
    ];
    for (elapsed, phase, disputable) in cases {
        let mut disputed = Harness::new();
        disputed.propose(&[disputed.leaf(0, OPTIMISM, 0, WEI as i128)]);
        disputed.clock.advance(elapsed);
        assert_eq!(disputed.hub.phase(), phase, "{elapsed}s");
        let disputer = disputed.disputer;
        let dispute = disputed.hub.dispute_root_bundle(disputer);

        let mut executed = Harness::new();
        let leaf = executed.leaf(0, OPTIMISM, 0, WEI as i128);
        let tree = executed.propose(std::slice::from_ref(&leaf));
        executed.clock.advance(elapsed);
        let execution = executed.execute(&tree, &leaf);

        if disputable {
            assert!(matches!(dispute, Ok(DisputeOutcome::Disputed(_))), "{elapsed}s");
            assert!(
                matches!(execution, Err(HubError::ChallengePeriodActive { .. })),
                "{elapsed}s"
            );
            assert!(executed.optimism.calls().is_empty());
        } else {
            assert!(
                matches!(dispute, Err(HubError::ChallengePeriodElapsed { .. })),
                "{elapsed}s"
            );
            assert!(disputed.hub.proposal().is_some());
            assert!(disputed.oracle.requests().is_empty());
            execution.unwrap();
        }
    }
}

#[test]
fn spare_leaf_after_full_execution_changes_nothing() {
    let mut h = Harness::new();
    let leaves = [
        h.leaf(0, OPTIMISM, WEI, 10 * WEI as i128),
        h.leaf(1, POLYGON, WEI, 10 * WEI as i128),
    ];
    // The tree holds two leaves but the proposal only counts one.
    let tree = h.propose_counted(&leaves, 1);
    h.pass_liveness();
    h.execute(&tree, &leaves[0]).unwrap();
    assert_eq!(h.hub.phase(), BundlePhase::Empty);
    assert_eq!(h.hub.bond_escrow().credit_of(h.proposer), h.bond());

    let state = h.state();
    let events = h.hub.events().len();
    let vault = h.hub.ledger().vault_balance(h.weth);
    assert!(matches!(
        h.execute(&tree, &leaves[1]),
        Err(HubError::ProposalFullyExecuted)
    ));

    assert_eq!(h.state(), state);
    assert_eq!(h.hub.events().len(), events);
    assert_eq!(h.hub.ledger().vault_balance(h.weth), vault);
    assert!(h.polygon.calls().is_empty());
    let proposal = h.hub.proposal().unwrap();
    assert_eq!(proposal.unclaimed_leaf_count, 0);
    assert!(!proposal.claims.is_claimed(1).unwrap());
    assert_eq!(h.hub.bond_escrow().credit_of(h.proposer), h.bond());
    assert_eq!(h.hub.bond_escrow().held(), 0);

    // The next bundle proposes normally.
    h.propose(&[h.leaf(0, OPTIMISM, 0, 0)]);
}

#[test]
fn tampered_leaf_fails_proof() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, WEI, 10 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();

    let proof = tree.proof(&leaf).unwrap();
    let mut forged = leaf.clone();
    forged.net_send_amounts = vec![500 * WEI as i128];
    let owner = h.owner;
    assert!(matches!(
        h.hub.execute_root_bundle(owner, &forged, &proof),
        Err(HubError::InvalidProof(LeafId(0)))
    ));
    assert!(h.optimism.calls().is_empty());
}

#[test]
fn adapter_failure_is_atomic_and_retryable() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, 10 * WEI, 100 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();

    let before = h.state();
    let events = h.hub.events().len();
    h.optimism
        .fail_next_with(HubError::Internal("bridge unavailable".into()));
    let err = h.execute(&tree, &leaf).unwrap_err();
    assert!(matches!(err, HubError::AdapterCallFailed { chain: OPTIMISM, .. }));

    assert_eq!(h.state(), before);
    assert_eq!(h.hub.ledger().vault_balance(h.weth), 1_000 * WEI);
    assert!(!h.hub.is_leaf_claimed(LeafId(0)).unwrap());
    assert_eq!(h.hub.events().len(), events);
    assert_eq!(h.hub.bond_escrow().credit_of(h.proposer), 0);

    h.execute(&tree, &leaf).unwrap();
    assert!(h.hub.is_leaf_claimed(LeafId(0)).unwrap());
    assert_eq!(h.state().liquid_reserves, 900 * WEI as i128);
}

#[test]
fn adapter_cannot_reenter_during_execution() {
    let mut h = Harness::new();
    h.optimism.attempt_reentry_into(h.hub.reentrancy_guard());
    let leaf = h.leaf(0, OPTIMISM, WEI, 10 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();
    h.execute(&tree, &leaf).unwrap();

    // One token relay plus the root message, both refused re-entry.
    assert_eq!(h.optimism.reentry_attempts(), (2, 0));
    assert!(!h.hub.reentrancy_guard().is_engaged());
}

#[test]
fn claims_reset_for_each_proposal() {
    let mut h = Harness::new();
    let first = h.leaf(0, OPTIMISM, 0, WEI as i128);
    let tree = h.propose(std::slice::from_ref(&first));
    h.pass_liveness();
    h.execute(&tree, &first).unwrap();
    assert_eq!(h.hub.phase(), BundlePhase::Empty);

    let second = h.leaf(0, OPTIMISM, 0, 2 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&second));
    assert!(!h.hub.is_leaf_claimed(LeafId(0)).unwrap());
    h.pass_liveness();
    h.execute(&tree, &second).unwrap();
}

#[test]
fn bounded_bitmap_caps_bundle_at_256_leaves() {
    let mut h = Harness::with_config(|c| c.claim_bitmap = ClaimBitmapKind::Bounded);
    let last = h.leaf(255, OPTIMISM, 0, 0);
    let tree = MerkleTree::from_leaves(std::slice::from_ref(&last));
    let mut roots = ProposedRoots {
        bundle_evaluation_block_numbers: vec![1],
        pool_rebalance_leaf_count: 257,
        pool_rebalance_root: tree.root(),
        relayer_refund_root: Hash256::ZERO,
        slow_relay_root: Hash256::ZERO,
    };
    let proposer = h.proposer;
    assert!(matches!(
        h.hub.propose_root_bundle(proposer, roots.clone()),
        Err(HubError::IndexOutOfRange { index: 256, bound: 256 })
    ));

    roots.pool_rebalance_leaf_count = 256;
    h.hub.propose_root_bundle(proposer, roots).unwrap();
    h.pass_liveness();
    h.execute(&tree, &last).unwrap();
    assert!(h.hub.is_leaf_claimed(LeafId(255)).unwrap());

    let beyond = h.leaf(256, OPTIMISM, 0, 0);
    let owner = h.owner;
    assert!(matches!(
        h.hub.execute_root_bundle(owner, &beyond, &[]),
        Err(HubError::IndexOutOfRange { index: 256, .. })
    ));
}

#[test]
fn roots_relay_once_per_destination() {
    let mut h = Harness::new();
    let leaves = [
        h.leaf(0, OPTIMISM, 0, WEI as i128),
        h.leaf(1, OPTIMISM, 0, 2 * WEI as i128),
        h.leaf(2, POLYGON, 0, 3 * WEI as i128),
    ];
    let tree = h.propose(&leaves);
    h.pass_liveness();
    for leaf in &leaves {
        h.execute(&tree, leaf).unwrap();
    }

    let messages = |calls: Vec<AdapterCall>| -> Vec<Vec<u8>> {
        calls
            .into_iter()
            .filter_map(|c| match c {
                AdapterCall::Message { payload, .. } => Some(payload),
                AdapterCall::Tokens(_) => None,
            })
            .collect()
    };
    let to_optimism = messages(h.optimism.calls());
    let to_polygon = messages(h.polygon.calls());
    assert_eq!(to_optimism.len(), 1);
    assert_eq!(to_polygon.len(), 1);

    let decoded = RootBundleMessage::decode(&to_optimism[0]).unwrap();
    assert_eq!(decoded.relayer_refund_root, Hash256([0xbb; 32]));
    assert_eq!(decoded.slow_relay_root, Hash256([0xcc; 32]));
    assert_eq!(h.optimism.calls().len(), 3);
}

#[test]
fn last_leaf_returns_bond() {
    let mut h = Harness::new();
    let leaves = [
        h.leaf(0, OPTIMISM, 0, WEI as i128),
        h.leaf(1, POLYGON, 0, WEI as i128),
    ];
    let tree = h.propose(&leaves);
    assert_eq!(h.hub.bond_escrow().held(), h.bond());
    h.pass_liveness();

    h.execute(&tree, &leaves[1]).unwrap();
    assert_eq!(h.hub.bond_escrow().credit_of(h.proposer), 0);
    h.execute(&tree, &leaves[0]).unwrap();
    assert_eq!(h.hub.bond_escrow().credit_of(h.proposer), h.bond());
    assert_eq!(h.hub.bond_escrow().held(), 0);
    assert!(h.hub.proposal().unwrap().bond_repaid);

    // Deleting a finished proposal does not pay the bond twice.
    let owner = h.owner;
    h.hub.emergency_delete_proposal(owner).unwrap();
    let proposer = h.proposer;
    assert_eq!(h.hub.withdraw_bond_credit(proposer).unwrap(), h.bond());
    assert_eq!(h.hub.withdraw_bond_credit(proposer).unwrap(), 0);
}

#[test]
fn pause_blocks_proposals_and_execution() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, 0, WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();

    let owner = h.owner;
    h.hub.set_paused(owner, true).unwrap();
    assert!(matches!(h.execute(&tree, &leaf), Err(HubError::Paused)));
    let (lp, weth) = (h.lp, h.weth);
    assert!(matches!(
        h.hub.add_liquidity(lp, weth, WEI, false),
        Err(HubError::Paused)
    ));

    h.hub.set_paused(owner, false).unwrap();
    h.execute(&tree, &leaf).unwrap();
}

// =========================================================================
// Disputes
// =========================================================================

#[test]
fn dispute_deletes_proposal_and_stakes_both_bonds() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, 0, WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));

    let disputer = h.disputer;
    let outcome = h.hub.dispute_root_bundle(disputer).unwrap();
    assert!(matches!(outcome, DisputeOutcome::Disputed(_)));
    assert!(h.hub.proposal().is_none());
    assert_eq!(h.hub.phase(), BundlePhase::Empty);
    assert_eq!(h.hub.bond_escrow().held(), 0);
    assert_eq!(h.hub.bond_escrow().at_oracle(), 2 * h.bond());

    let requests = h.oracle.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0].1;
    assert_eq!(request.stake, h.bond());
    assert_eq!(request.identifier, constants::DEFAULT_IDENTIFIER);
    assert!(request.ancillary_data.contains("pool_rebalance_leaf_count:1"));
    assert_eq!(request.proposer, h.proposer);

    h.pass_liveness();
    assert!(matches!(
        h.execute(&tree, &leaf),
        Err(HubError::NoPendingProposal)
    ));
    // A fresh proposal is accepted right away.
    h.propose(std::slice::from_ref(&leaf));
}

#[test]
fn dispute_after_window_is_rejected() {
    let mut h = Harness::new();
    h.propose(&[h.leaf(0, OPTIMISM, 0, 0)]);
    h.clock.advance(constants::DEFAULT_LIVENESS_SECS + 1);
    let disputer = h.disputer;
    assert!(matches!(
        h.hub.dispute_root_bundle(disputer),
        Err(HubError::ChallengePeriodElapsed { .. })
    ));
    assert!(h.hub.proposal().is_some());
}

#[test]
fn fee_increase_cancels_without_oracle_request() {
    let mut h = Harness::new();
    h.propose(&[h.leaf(0, OPTIMISM, 0, 0)]);
    h.oracle.set_final_fee(h.weth, 2 * FINAL_FEE);

    let disputer = h.disputer;
    assert_eq!(
        h.hub.dispute_root_bundle(disputer).unwrap(),
        DisputeOutcome::Canceled
    );
    assert!(h.hub.proposal().is_none());
    assert!(h.oracle.requests().is_empty());
    assert_eq!(h.hub.bond_escrow().credit_of(h.proposer), h.bond());
    assert_eq!(h.hub.bond_escrow().at_oracle(), 0);
    assert_eq!(h.kinds().last(), Some(&HubEventKind::RootBundleCanceled));
}

#[test]
fn fee_decrease_refunds_difference_to_proposer() {
    let mut h = Harness::new();
    h.propose(&[h.leaf(0, OPTIMISM, 0, 0)]);
    let fee_now = FINAL_FEE / 2;
    h.oracle.set_final_fee(h.weth, fee_now);

    let disputer = h.disputer;
    h.hub.dispute_root_bundle(disputer).unwrap();

    let stake = constants::DEFAULT_BOND_AMOUNT + fee_now;
    assert_eq!(h.hub.bond_escrow().credit_of(h.proposer), FINAL_FEE - fee_now);
    assert_eq!(h.hub.bond_escrow().at_oracle(), 2 * stake);
    assert_eq!(h.hub.bond_escrow().held(), 0);
    let request = &h.oracle.requests()[0].1;
    assert_eq!(request.stake, stake);
    assert_eq!(request.final_fee, fee_now);
}

#[test]
fn oracle_failure_leaves_proposal_untouched() {
    let mut h = Harness::new();
    h.propose(&[h.leaf(0, OPTIMISM, 0, 0)]);
    let events = h.hub.events().len();
    h.oracle.fail_requests(true);

    let disputer = h.disputer;
    assert!(matches!(
        h.hub.dispute_root_bundle(disputer),
        Err(HubError::OracleCallFailed { .. })
    ));
    assert!(h.hub.proposal().is_some());
    assert_eq!(h.hub.bond_escrow().held(), h.bond());
    assert_eq!(h.hub.bond_escrow().at_oracle(), 0);
    assert_eq!(h.hub.events().len(), events);
}

#[test]
fn settled_dispute_pays_winner_minus_final_fee() {
    let mut h = Harness::new();
    h.propose(&[h.leaf(0, OPTIMISM, 0, 0)]);
    let disputer = h.disputer;
    let DisputeOutcome::Disputed(handle) = h.hub.dispute_root_bundle(disputer).unwrap() else {
        panic!("expected a dispute");
    };
    assert!(h.hub.open_dispute(handle).is_some());

    h.oracle.resolve(handle, false);
    let resolution = h.hub.settle_dispute(handle).unwrap();
    assert!(!resolution.proposal_valid);
    assert_eq!(resolution.winner, disputer);
    assert_eq!(resolution.payout, 2 * h.bond() - FINAL_FEE);

    let escrow = h.hub.bond_escrow();
    assert_eq!(escrow.credit_of(disputer), 2 * h.bond() - FINAL_FEE);
    assert_eq!(escrow.credit_of(h.proposer), 0);
    assert_eq!(escrow.oracle_retained(), FINAL_FEE);
    assert_eq!(escrow.at_oracle(), 0);
    assert!(h.hub.open_dispute(handle).is_none());
}

// =========================================================================
// Liquidity
// =========================================================================

#[test]
fn exchange_rate_never_decreases() {
    let mut h = Harness::new();
    let mut rng = rand::thread_rng();
    let mut last = h.rate();

    for _ in 0..6 {
        let fee = rng.gen_range(0..5 * WEI);
        let send = rng.gen_range(0..20 * WEI);
        let leaf = h.leaf(0, OPTIMISM, fee, i128::try_from(send).unwrap());
        let tree = h.propose(std::slice::from_ref(&leaf));
        h.pass_liveness();
        h.execute(&tree, &leaf).unwrap();

        let rate = h.rate();
        assert!(rate >= last, "rate fell from {last} to {rate}");
        last = rate;

        h.clock.advance(rng.gen_range(0..3 * DAY));
        let rate = h.rate();
        assert!(rate >= last, "rate fell from {last} to {rate}");
        last = rate;

        // Half of what went out comes back; reconciliation keeps the rate.
        let weth = h.weth;
        h.hub.record_external_transfer(weth, send / 2).unwrap();
        let rate = h.rate();
        assert!(rate >= last, "rate fell from {last} to {rate}");
        last = rate;
    }
}

#[test]
fn add_then_remove_returns_deposit() {
    let mut h = Harness::new();
    let (weth, alice) = (h.weth, Address::from_low_u64(0xa11ce));
    let minted = h.hub.add_liquidity(alice, weth, 500 * WEI, false).unwrap();
    assert_eq!(minted, 500 * WEI);
    assert_eq!(h.hub.lp_balance(weth, alice), 500 * WEI);

    let returned = h.hub.remove_liquidity(alice, weth, minted, false).unwrap();
    assert_eq!(returned, 500 * WEI);
    assert_eq!(h.hub.lp_balance(weth, alice), 0);
    assert_eq!(h.rate(), Decimal::ONE);
    assert!(matches!(
        h.hub.remove_liquidity(alice, weth, 1, false),
        Err(HubError::InsufficientShares { .. })
    ));
}

#[test]
fn returned_tokens_floor_utilization_at_zero() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, 0, -50 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();
    h.execute(&tree, &leaf).unwrap();
    assert!(
        h.optimism
            .calls()
            .iter()
            .all(|c| matches!(c, AdapterCall::Message { .. })),
        "negative net sends relay no tokens"
    );

    let weth = h.weth;
    h.hub.record_external_transfer(weth, 50 * WEI).unwrap();
    assert_eq!(h.hub.liquidity_utilization_current(weth).unwrap(), Decimal::ZERO);
    let s = h.state();
    assert_eq!(s.liquid_reserves, 1_050 * WEI as i128);
    assert_eq!(s.utilized_reserves, -50 * WEI as i128);
    assert_eq!(
        h.hub.liquidity_utilization_post_relay(weth, 105 * WEI).unwrap(),
        dec("0.1")
    );
    assert_eq!(h.rate(), Decimal::ONE);
}

#[test]
fn protocol_fees_are_captured_and_claimed() {
    let mut h = Harness::new();
    let (owner, treasury) = (h.owner, Address::from_low_u64(0x7ea5));
    h.hub
        .set_protocol_fee_capture(owner, treasury, dec("0.1"))
        .unwrap();

    let leaf = h.leaf(0, OPTIMISM, 10 * WEI, 100 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();
    h.execute(&tree, &leaf).unwrap();

    let weth = h.weth;
    assert_eq!(h.hub.unclaimed_protocol_fees(weth), WEI);
    assert_eq!(h.state().undistributed_lp_fees, 9 * WEI);
    assert!(h.hub.events().iter().any(|e| matches!(
        e,
        HubEvent::ProtocolFeesCaptured { amount, .. } if *amount == WEI
    )));

    assert_eq!(h.hub.claim_protocol_fees(weth).unwrap(), WEI);
    assert_eq!(h.hub.unclaimed_protocol_fees(weth), 0);
    assert!(matches!(
        h.hub.events().last(),
        Some(HubEvent::ProtocolFeesClaimed { recipient, .. }) if *recipient == treasury
    ));
}

#[test]
fn haircut_lowers_exchange_rate() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, 0, 100 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();
    h.execute(&tree, &leaf).unwrap();

    let (owner, weth) = (h.owner, h.weth);
    h.hub.haircut_reserves(owner, weth, 100 * WEI as i128).unwrap();
    assert_eq!(h.rate(), dec("0.9"));
    assert_eq!(h.state().utilized_reserves, 0);
}

// =========================================================================
// Event log
// =========================================================================

#[test]
fn event_log_records_lifecycle_and_serializes() {
    let mut h = Harness::new();
    let leaf = h.leaf(0, OPTIMISM, WEI, 10 * WEI as i128);
    let tree = h.propose(std::slice::from_ref(&leaf));
    h.pass_liveness();
    h.execute(&tree, &leaf).unwrap();

    let kinds = h.kinds();
    assert_eq!(
        &kinds[kinds.len() - 2..],
        &[HubEventKind::ProposeRootBundle, HubEventKind::RootBundleExecuted]
    );
    assert!(kinds.contains(&HubEventKind::AssetEnabled));
    assert!(kinds.contains(&HubEventKind::LiquidityAdded));

    let json = serde_json::to_string(h.hub.events()).unwrap();
    let back: Vec<HubEvent> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, h.hub.events());

    let drained = h.hub.drain_events();
    assert_eq!(drained.len(), kinds.len());
    assert!(h.hub.events().is_empty());
}
