//! The hub: one facade over the bundle lifecycle, the liquidity ledger,
//! destination adapters, the oracle and bond custody.
//!
//! Every mutating operation:
//! 1. enters the [`ReentrancyGuard`]
//! 2. checks authorization, pause state and lifecycle timing
//! 3. computes its effects without writing
//! 4. performs external calls (oracle, adapters)
//! 5. writes state and appends a [`HubEvent`]
//!
//! An error at any step returns before step 5, so failed operations leave
//! no trace.

use std::sync::Arc;

use hubledger_liquidity::LiquidityLedger;
use hubledger_merkle::{ClaimBitmapTracker, ClaimTracker, verify};
use hubledger_types::{
    Address, Asset, ChainId, Clock, Hash256, HubConfig, HubError, HubEvent, LeafId, LpTokenId,
    PoolRebalanceLeaf, PooledTokenState, RequestHandle, Result, Timestamp, constants,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    adapter::{AdapterRegistry, CrossChainAdapter, RelayInstruction, RelayPlan, RootBundleMessage, TokenRelay},
    bond::BondEscrow,
    guard::ReentrancyGuard,
    oracle::{TruthOracle, VerdictRequest},
    proposal::{BundlePhase, ProposedRoots, RootBundleProposal},
    session::{BundleSession, DisputeRecord},
};

/// What a dispute did to the proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeOutcome {
    /// The oracle fee rose since proposal; the bond was returned and no
    /// oracle request was made.
    Canceled,
    /// Both stakes went to the oracle under this request.
    Disputed(RequestHandle),
}

/// Result of settling a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisputeResolution {
    pub request: RequestHandle,
    pub proposal_valid: bool,
    pub winner: Address,
    pub payout: u128,
}

pub struct HubPool {
    config: HubConfig,
    clock: Arc<dyn Clock>,
    oracle: Box<dyn TruthOracle>,
    ledger: LiquidityLedger,
    session: BundleSession,
    adapters: AdapterRegistry,
    escrow: BondEscrow,
    guard: ReentrancyGuard,
    events: Vec<HubEvent>,
    paused: bool,
}

impl std::fmt::Debug for HubPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubPool")
            .field("owner", &self.config.owner)
            .field("paused", &self.paused)
            .field("proposal", &self.session.proposal().is_some())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

fn overflow(context: &'static str) -> HubError {
    HubError::ArithmeticOverflow { context }
}

impl HubPool {
    /// Build a hub from a validated config.
    pub fn new(config: HubConfig, clock: Arc<dyn Clock>, oracle: Box<dyn TruthOracle>) -> Result<Self> {
        config.validate()?;
        info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            owner = %config.owner,
            liveness_secs = config.liveness_secs,
            "hub created"
        );
        Ok(Self {
            ledger: LiquidityLedger::from_config(&config),
            config,
            clock,
            oracle,
            session: BundleSession::new(),
            adapters: AdapterRegistry::new(),
            escrow: BondEscrow::new(),
            guard: ReentrancyGuard::new(),
            events: Vec::new(),
            paused: false,
        })
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn emit(&mut self, event: HubEvent) {
        self.events.push(event);
    }

    fn only_owner(&self, caller: Address) -> Result<()> {
        if caller != self.config.owner {
            return Err(HubError::Unauthorized { caller });
        }
        Ok(())
    }

    fn when_not_paused(&self) -> Result<()> {
        if self.paused {
            return Err(HubError::Paused);
        }
        Ok(())
    }

    // =====================================================================
    // Bundle lifecycle
    // =====================================================================

    /// Propose a root bundle, bonding `bond_amount + final_fee` from `caller`.
    pub fn propose_root_bundle(&mut self, caller: Address, roots: ProposedRoots) -> Result<()> {
        let _entered = self.guard.enter()?;
        self.when_not_paused()?;
        self.session.ensure_can_propose()?;

        let leaf_count = roots.pool_rebalance_leaf_count;
        if leaf_count == 0 {
            return Err(HubError::InvalidAmount {
                reason: "Bundle must have at least 1 leaf".into(),
            });
        }
        if let Some(bound) = ClaimBitmapTracker::new(self.config.claim_bitmap).capacity() {
            if leaf_count > bound {
                return Err(HubError::IndexOutOfRange {
                    index: leaf_count - 1,
                    bound,
                });
            }
        }

        let final_fee = self.oracle.final_fee(self.config.bond_asset)?;
        let bond = self
            .config
            .bond_amount
            .checked_add(final_fee)
            .ok_or_else(|| overflow("bond"))?;
        let now = self.now();
        let challenge_period_end = now.plus_secs(self.config.liveness_secs);
        let proposal = RootBundleProposal::new(
            roots,
            caller,
            challenge_period_end,
            bond,
            final_fee,
            self.config.claim_bitmap,
        );
        let event = HubEvent::ProposeRootBundle {
            challenge_period_end,
            leaf_count,
            pool_rebalance_root: proposal.pool_rebalance_root,
            relayer_refund_root: proposal.relayer_refund_root,
            slow_relay_root: proposal.slow_relay_root,
            proposer: caller,
        };

        self.escrow.post(caller, bond)?;
        self.session.install(proposal)?;
        info!(
            proposer = %caller,
            leaf_count,
            bond,
            %challenge_period_end,
            "root bundle proposed"
        );
        self.emit(event);
        Ok(())
    }

    /// Dispute the pending proposal within its challenge window.
    ///
    /// If the oracle fee has risen since proposal the proposal is cancelled
    /// and the proposer refunded in full. Otherwise the proposer gets back
    /// the fee difference, both sides stake `bond_amount + fee_now` with
    /// the oracle, and the proposal is deleted.
    pub fn dispute_root_bundle(&mut self, caller: Address) -> Result<DisputeOutcome> {
        let _entered = self.guard.enter()?;
        let now = self.now();
        let proposal = self.session.disputable(now)?;
        let proposer = proposal.proposer;
        let bond_posted = proposal.bond_posted;
        let snapshot = proposal.final_fee_snapshot;

        let fee_now = self.oracle.final_fee(self.config.bond_asset)?;
        if fee_now > snapshot {
            self.escrow.release_to(proposer, bond_posted)?;
            self.session.take();
            warn!(
                %proposer,
                disputer = %caller,
                fee_at_proposal = snapshot,
                fee_now,
                "oracle fee increased; proposal canceled"
            );
            self.emit(HubEvent::RootBundleCanceled {
                disputer: caller,
                request_time: now,
            });
            return Ok(DisputeOutcome::Canceled);
        }

        let refund = snapshot - fee_now;
        let stake = proposal
            .bond_amount()
            .checked_add(fee_now)
            .ok_or_else(|| overflow("stake"))?;
        let reconciled = refund.checked_add(stake).ok_or_else(|| overflow("stake"))?;
        if reconciled != bond_posted {
            return Err(HubError::FeeReconciliationMismatch {
                expected: bond_posted,
                actual: reconciled,
            });
        }
        let both_stakes = stake.checked_mul(2).ok_or_else(|| overflow("stake"))?;

        let request = VerdictRequest {
            identifier: self.config.identifier.clone(),
            request_time: now,
            ancillary_data: proposal.ancillary_data(),
            proposer,
            disputer: caller,
            currency: self.config.bond_asset,
            stake,
            final_fee: fee_now,
        };
        let handle = self.oracle.request_verdict(request)?;

        self.escrow.post(caller, stake)?;
        self.escrow.release_to(proposer, refund)?;
        self.escrow.forward_to_oracle(both_stakes)?;
        self.session.take();
        self.session.record_dispute(
            handle,
            DisputeRecord {
                proposer,
                disputer: caller,
                stake,
                final_fee: fee_now,
                disputed_at: now,
            },
        );
        info!(%proposer, disputer = %caller, stake, refund, %handle, "root bundle disputed");
        self.emit(HubEvent::RootBundleDisputed {
            disputer: caller,
            request_time: now,
            request: handle,
        });
        Ok(DisputeOutcome::Disputed(handle))
    }

    /// Pay out a resolved dispute: the winner receives both stakes minus
    /// the finality fee the oracle keeps.
    pub fn settle_dispute(&mut self, handle: RequestHandle) -> Result<DisputeResolution> {
        let _entered = self.guard.enter()?;
        let record = self
            .session
            .dispute(handle)
            .cloned()
            .ok_or(HubError::DisputeNotFound(handle))?;
        let verdict = self
            .oracle
            .settled_verdict(handle)?
            .ok_or(HubError::VerdictNotResolved(handle))?;

        let winner = if verdict.proposal_valid {
            record.proposer
        } else {
            record.disputer
        };
        let returned = record
            .stake
            .checked_mul(2)
            .ok_or_else(|| overflow("stake"))?;
        let payout = returned
            .checked_sub(record.final_fee)
            .ok_or_else(|| overflow("payout"))?;

        self.escrow.settle_from_oracle(winner, returned, payout)?;
        self.session.close_dispute(handle)?;
        info!(%handle, proposal_valid = verdict.proposal_valid, %winner, payout, "dispute settled");
        self.emit(HubEvent::DisputeSettled {
            request: handle,
            proposal_valid: verdict.proposal_valid,
            winner,
            payout,
        });
        Ok(DisputeResolution {
            request: handle,
            proposal_valid: verdict.proposal_valid,
            winner,
            payout,
        })
    }

    /// Execute one pool rebalance leaf of the pending proposal.
    ///
    /// Stages the ledger effects, dispatches token relays (and, on the
    /// first leaf for this destination, the root bundle message), then
    /// commits. An adapter failure aborts with nothing written. The last
    /// leaf returns the bond to the proposer.
    pub fn execute_root_bundle(
        &mut self,
        caller: Address,
        leaf: &PoolRebalanceLeaf,
        proof: &[Hash256],
    ) -> Result<()> {
        let _entered = self.guard.enter()?;
        self.when_not_paused()?;
        let now = self.now();
        leaf.validate_shape()?;

        let proposal = self.session.executable(leaf.leaf_id, now)?;
        let chain = leaf.destination_chain_id;
        let spoke_pool = self.adapters.spoke_pool(chain)?;

        let mut instructions = Vec::new();
        for (asset, _, net_send) in leaf.entries() {
            let l2_token = self.adapters.route(chain, asset)?;
            if net_send > 0 {
                instructions.push(RelayInstruction::Tokens(TokenRelay {
                    l1_token: asset,
                    l2_token,
                    amount: u128::try_from(net_send).map_err(|_| overflow("net send"))?,
                    to: spoke_pool,
                }));
            }
        }

        if !verify(&proposal.pool_rebalance_root, leaf, proof) {
            return Err(HubError::InvalidProof(leaf.leaf_id));
        }

        let relay_roots = !proposal.roots_relayed_to.contains(&chain);
        if relay_roots {
            let message = RootBundleMessage {
                relayer_refund_root: proposal.relayer_refund_root,
                slow_relay_root: proposal.slow_relay_root,
            };
            instructions.push(RelayInstruction::Message {
                target: spoke_pool,
                payload: message.encode(),
            });
        }
        let proposer = proposal.proposer;
        let bond_posted = proposal.bond_posted;
        let last_leaf = proposal.unclaimed_leaf_count == 1;
        if last_leaf {
            self.escrow.ensure_held(bond_posted)?;
        }

        let staged = {
            let mut tx = self.ledger.begin(now);
            for (asset, lp_fee, net_send) in leaf.entries() {
                tx.apply_leaf_entry(asset, lp_fee, net_send)?;
            }
            tx.finish()
        };

        let plan = RelayPlan {
            chain,
            instructions,
        };
        if let Err(err) = self.adapters.dispatch(&plan) {
            warn!(leaf = %leaf.leaf_id, %chain, error = %err, "leaf execution aborted");
            return Err(err);
        }

        // Nothing below may fail: every check it depends on ran above.
        let captures = self.ledger.commit(staged);
        let remaining = self.session.record_execution(leaf.leaf_id)?;
        if let Some(p) = self.session.proposal_mut() {
            if relay_roots {
                p.roots_relayed_to.insert(chain);
            }
            if remaining == 0 {
                p.bond_repaid = true;
            }
        }
        for capture in captures.into_iter().filter(|c| c.protocol_fees > 0) {
            self.emit(HubEvent::ProtocolFeesCaptured {
                asset: capture.asset,
                amount: capture.protocol_fees,
            });
        }
        info!(leaf = %leaf.leaf_id, %chain, remaining, relayed_roots = relay_roots, "leaf executed");
        self.emit(HubEvent::RootBundleExecuted {
            group_index: leaf.group_index,
            leaf_id: leaf.leaf_id,
            chain_id: chain,
            l1_tokens: leaf.l1_tokens.clone(),
            bundle_lp_fees: leaf.bundle_lp_fees.clone(),
            net_send_amounts: leaf.net_send_amounts.clone(),
            running_balances: leaf.running_balances.clone(),
            caller,
        });

        if remaining == 0 {
            self.escrow.release_to(proposer, bond_posted)?;
            info!(%proposer, bond = bond_posted, "bundle fully executed; bond returned");
        }
        Ok(())
    }

    // =====================================================================
    // Liquidity
    // =====================================================================

    pub fn add_liquidity(&mut self, caller: Address, asset: Asset, amount: u128, native: bool) -> Result<u128> {
        let _entered = self.guard.enter()?;
        self.when_not_paused()?;
        let now = self.now();
        let minted = self.ledger.add_liquidity(asset, caller, amount, native, now)?;
        self.emit(HubEvent::LiquidityAdded {
            asset,
            amount,
            lp_tokens_minted: minted,
            provider: caller,
        });
        Ok(minted)
    }

    pub fn remove_liquidity(
        &mut self,
        caller: Address,
        asset: Asset,
        lp_tokens: u128,
        want_native: bool,
    ) -> Result<u128> {
        let _entered = self.guard.enter()?;
        self.when_not_paused()?;
        let now = self.now();
        let amount = self
            .ledger
            .remove_liquidity(asset, caller, lp_tokens, want_native, now)?;
        self.emit(HubEvent::LiquidityRemoved {
            asset,
            amount,
            lp_tokens_burned: lp_tokens,
            provider: caller,
        });
        Ok(amount)
    }

    pub fn exchange_rate_current(&mut self, asset: Asset) -> Result<Decimal> {
        let _entered = self.guard.enter()?;
        let now = self.now();
        self.ledger.exchange_rate_current(asset, now)
    }

    pub fn liquidity_utilization_current(&mut self, asset: Asset) -> Result<Decimal> {
        let _entered = self.guard.enter()?;
        let now = self.now();
        self.ledger.liquidity_utilization_current(asset, now)
    }

    pub fn liquidity_utilization_post_relay(&mut self, asset: Asset, relayed: u128) -> Result<Decimal> {
        let _entered = self.guard.enter()?;
        let now = self.now();
        self.ledger.liquidity_utilization_post_relay(asset, relayed, now)
    }

    pub fn sync(&mut self, asset: Asset) -> Result<()> {
        let _entered = self.guard.enter()?;
        let now = self.now();
        self.ledger.sync(asset, now)
    }

    /// Tokens of `asset` arrived on the hub outside of an LP deposit.
    pub fn record_external_transfer(&mut self, asset: Asset, amount: u128) -> Result<()> {
        self.ledger.record_external_transfer(asset, amount)
    }

    /// Pay unclaimed protocol fees for `asset` to the fee recipient.
    pub fn claim_protocol_fees(&mut self, asset: Asset) -> Result<u128> {
        let _entered = self.guard.enter()?;
        let (recipient, amount) = self.ledger.claim_protocol_fees(asset)?;
        if amount > 0 {
            self.emit(HubEvent::ProtocolFeesClaimed {
                asset,
                recipient,
                amount,
            });
        }
        Ok(amount)
    }

    /// Withdraw bond refunds and dispute winnings credited to `caller`.
    pub fn withdraw_bond_credit(&mut self, caller: Address) -> Result<u128> {
        let _entered = self.guard.enter()?;
        Ok(self.escrow.withdraw(caller))
    }

    // =====================================================================
    // Admin
    // =====================================================================

    pub fn set_paused(&mut self, caller: Address, paused: bool) -> Result<()> {
        self.only_owner(caller)?;
        self.paused = paused;
        info!(paused, "pause state set");
        self.emit(HubEvent::Paused { paused });
        Ok(())
    }

    /// Change the bond. Not allowed while a proposal has unexecuted leaves.
    pub fn set_bond(&mut self, caller: Address, bond_asset: Asset, bond_amount: u128) -> Result<()> {
        self.only_owner(caller)?;
        let _entered = self.guard.enter()?;
        self.session.ensure_can_propose()?;
        if bond_amount == 0 {
            return Err(HubError::InvalidAmount {
                reason: "bond amount must be positive".into(),
            });
        }
        if !self.oracle.is_collateral_whitelisted(bond_asset)? {
            return Err(HubError::CollateralNotWhitelisted(bond_asset));
        }
        self.config.bond_asset = bond_asset;
        self.config.bond_amount = bond_amount;
        self.emit(HubEvent::BondSet {
            bond_asset,
            bond_amount,
        });
        Ok(())
    }

    pub fn set_liveness(&mut self, caller: Address, liveness_secs: u64) -> Result<()> {
        self.only_owner(caller)?;
        if liveness_secs < constants::MIN_LIVENESS_SECS {
            return Err(HubError::Configuration(format!(
                "Liveness too short: {liveness_secs} < {}",
                constants::MIN_LIVENESS_SECS
            )));
        }
        self.config.liveness_secs = liveness_secs;
        self.emit(HubEvent::LivenessSet { liveness_secs });
        Ok(())
    }

    pub fn set_identifier(&mut self, caller: Address, identifier: &str) -> Result<()> {
        self.only_owner(caller)?;
        if identifier.is_empty() {
            return Err(HubError::Configuration("identifier is empty".into()));
        }
        if !self.oracle.is_identifier_supported(identifier)? {
            return Err(HubError::IdentifierNotSupported(identifier.to_string()));
        }
        self.config.identifier = identifier.to_string();
        self.emit(HubEvent::IdentifierSet {
            identifier: identifier.to_string(),
        });
        Ok(())
    }

    pub fn set_cross_chain_contracts(
        &mut self,
        caller: Address,
        chain: ChainId,
        adapter: Box<dyn CrossChainAdapter>,
        spoke_pool: Address,
    ) -> Result<()> {
        self.only_owner(caller)?;
        let _entered = self.guard.enter()?;
        let adapter_name = adapter.name().to_string();
        self.adapters.set_destination(chain, adapter, spoke_pool);
        info!(%chain, adapter = %adapter_name, %spoke_pool, "cross-chain contracts set");
        self.emit(HubEvent::CrossChainContractsSet {
            chain_id: chain,
            adapter: adapter_name,
            spoke_pool,
        });
        Ok(())
    }

    pub fn set_pool_rebalance_route(
        &mut self,
        caller: Address,
        chain: ChainId,
        l1_token: Asset,
        destination_token: Address,
    ) -> Result<()> {
        self.only_owner(caller)?;
        self.adapters.set_route(chain, l1_token, destination_token);
        self.emit(HubEvent::RouteSet {
            destination_chain_id: chain,
            asset: l1_token,
            destination_token,
        });
        Ok(())
    }

    pub fn enable_l1_token_for_liquidity(&mut self, caller: Address, asset: Asset) -> Result<LpTokenId> {
        self.only_owner(caller)?;
        let now = self.now();
        let lp_token = self.ledger.enable_asset(asset, now)?;
        self.emit(HubEvent::AssetEnabled { asset, lp_token });
        Ok(lp_token)
    }

    pub fn disable_l1_token_for_liquidity(&mut self, caller: Address, asset: Asset) -> Result<()> {
        self.only_owner(caller)?;
        self.ledger.disable_asset(asset)?;
        self.emit(HubEvent::AssetDisabled { asset });
        Ok(())
    }

    pub fn set_protocol_fee_capture(&mut self, caller: Address, recipient: Address, pct: Decimal) -> Result<()> {
        self.only_owner(caller)?;
        self.ledger.set_protocol_fee_capture(recipient, pct)?;
        self.config.protocol_fee_recipient = recipient;
        self.config.protocol_fee_capture_pct = pct;
        self.emit(HubEvent::ProtocolFeeCaptureSet { recipient, pct });
        Ok(())
    }

    /// Write off `amount` of utilized reserves for `asset`.
    pub fn haircut_reserves(&mut self, caller: Address, asset: Asset, amount: i128) -> Result<()> {
        self.only_owner(caller)?;
        let _entered = self.guard.enter()?;
        let now = self.now();
        self.ledger.haircut_reserves(asset, amount, now)?;
        self.emit(HubEvent::ReservesHaircut { asset, amount });
        Ok(())
    }

    /// Delete the current proposal. An unpaid bond goes back to the proposer.
    pub fn emergency_delete_proposal(&mut self, caller: Address) -> Result<()> {
        self.only_owner(caller)?;
        let _entered = self.guard.enter()?;
        let proposal = self.session.proposal().ok_or(HubError::NoPendingProposal)?;
        let proposer = proposal.proposer;
        let pool_rebalance_root = proposal.pool_rebalance_root;
        if proposal.unclaimed_leaf_count > 0 && !proposal.bond_repaid {
            self.escrow.release_to(proposer, proposal.bond_posted)?;
        }
        self.session.take();
        warn!(%proposer, "root bundle deleted by owner");
        self.emit(HubEvent::RootBundleDeleted {
            pool_rebalance_root,
            proposer,
        });
        Ok(())
    }

    // =====================================================================
    // Queries
    // =====================================================================

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn proposal(&self) -> Option<&RootBundleProposal> {
        self.session.proposal()
    }

    #[must_use]
    pub fn phase(&self) -> BundlePhase {
        self.session.phase(self.now())
    }

    /// Whether `leaf` of the current proposal has executed.
    pub fn is_leaf_claimed(&self, leaf: LeafId) -> Result<bool> {
        self.session
            .proposal()
            .ok_or(HubError::NoPendingProposal)?
            .is_claimed(leaf)
    }

    #[must_use]
    pub fn open_dispute(&self, handle: RequestHandle) -> Option<&DisputeRecord> {
        self.session.dispute(handle)
    }

    #[must_use]
    pub fn pooled_token(&self, asset: Asset) -> Option<&PooledTokenState> {
        self.ledger.pooled_token(asset)
    }

    #[must_use]
    pub fn unclaimed_protocol_fees(&self, asset: Asset) -> u128 {
        self.ledger.unclaimed_protocol_fees(asset)
    }

    #[must_use]
    pub fn lp_balance(&self, asset: Asset, holder: Address) -> u128 {
        self.ledger.lp_balance(asset, holder)
    }

    #[must_use]
    pub fn ledger(&self) -> &LiquidityLedger {
        &self.ledger
    }

    #[must_use]
    pub fn bond_escrow(&self) -> &BondEscrow {
        &self.escrow
    }

    #[must_use]
    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Handle on the hub's reentrancy flag.
    #[must_use]
    pub fn reentrancy_guard(&self) -> ReentrancyGuard {
        self.guard.clone()
    }

    #[must_use]
    pub fn events(&self) -> &[HubEvent] {
        &self.events
    }

    /// Take all events recorded so far.
    pub fn drain_events(&mut self) -> Vec<HubEvent> {
        std::mem::take(&mut self.events)
    }
}
