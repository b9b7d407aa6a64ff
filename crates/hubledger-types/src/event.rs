//! Events emitted by the hub.
//!
//! Every state transition appends one [`HubEvent`] to the hub's log.
//! Off-chain observers (dataworkers, relayers, monitors) reconstruct pool
//! and bundle state from this log alone.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, Asset, ChainId, Hash256, LeafId, LpTokenId, RequestHandle, Timestamp};

/// Discriminant of a [`HubEvent`], used for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HubEventKind {
    ProposeRootBundle,
    RootBundleDisputed,
    RootBundleCanceled,
    RootBundleExecuted,
    RootBundleDeleted,
    DisputeSettled,
    LiquidityAdded,
    LiquidityRemoved,
    ProtocolFeesCaptured,
    ProtocolFeesClaimed,
    ReservesHaircut,
    AssetEnabled,
    AssetDisabled,
    RouteSet,
    CrossChainContractsSet,
    BondSet,
    LivenessSet,
    IdentifierSet,
    ProtocolFeeCaptureSet,
    Paused,
}

impl std::fmt::Display for HubEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ProposeRootBundle => "PROPOSE_ROOT_BUNDLE",
            Self::RootBundleDisputed => "ROOT_BUNDLE_DISPUTED",
            Self::RootBundleCanceled => "ROOT_BUNDLE_CANCELED",
            Self::RootBundleExecuted => "ROOT_BUNDLE_EXECUTED",
            Self::RootBundleDeleted => "ROOT_BUNDLE_DELETED",
            Self::DisputeSettled => "DISPUTE_SETTLED",
            Self::LiquidityAdded => "LIQUIDITY_ADDED",
            Self::LiquidityRemoved => "LIQUIDITY_REMOVED",
            Self::ProtocolFeesCaptured => "PROTOCOL_FEES_CAPTURED",
            Self::ProtocolFeesClaimed => "PROTOCOL_FEES_CLAIMED",
            Self::ReservesHaircut => "RESERVES_HAIRCUT",
            Self::AssetEnabled => "ASSET_ENABLED",
            Self::AssetDisabled => "ASSET_DISABLED",
            Self::RouteSet => "ROUTE_SET",
            Self::CrossChainContractsSet => "CROSS_CHAIN_CONTRACTS_SET",
            Self::BondSet => "BOND_SET",
            Self::LivenessSet => "LIVENESS_SET",
            Self::IdentifierSet => "IDENTIFIER_SET",
            Self::ProtocolFeeCaptureSet => "PROTOCOL_FEE_CAPTURE_SET",
            Self::Paused => "PAUSED",
        };
        f.write_str(name)
    }
}

/// A state transition recorded by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubEvent {
    ProposeRootBundle {
        challenge_period_end: Timestamp,
        leaf_count: u32,
        pool_rebalance_root: Hash256,
        relayer_refund_root: Hash256,
        slow_relay_root: Hash256,
        proposer: Address,
    },
    RootBundleDisputed {
        disputer: Address,
        request_time: Timestamp,
        request: RequestHandle,
    },
    /// Dispute arrived after the oracle fee rose; bond refunded, no oracle request.
    RootBundleCanceled {
        disputer: Address,
        request_time: Timestamp,
    },
    RootBundleExecuted {
        group_index: u32,
        leaf_id: LeafId,
        chain_id: ChainId,
        l1_tokens: Vec<Asset>,
        bundle_lp_fees: Vec<u128>,
        net_send_amounts: Vec<i128>,
        running_balances: Vec<i128>,
        caller: Address,
    },
    /// Owner removed the pending proposal.
    RootBundleDeleted {
        pool_rebalance_root: Hash256,
        proposer: Address,
    },
    DisputeSettled {
        request: RequestHandle,
        proposal_valid: bool,
        winner: Address,
        payout: u128,
    },
    LiquidityAdded {
        asset: Asset,
        amount: u128,
        lp_tokens_minted: u128,
        provider: Address,
    },
    LiquidityRemoved {
        asset: Asset,
        amount: u128,
        lp_tokens_burned: u128,
        provider: Address,
    },
    ProtocolFeesCaptured {
        asset: Asset,
        amount: u128,
    },
    ProtocolFeesClaimed {
        asset: Asset,
        recipient: Address,
        amount: u128,
    },
    ReservesHaircut {
        asset: Asset,
        amount: i128,
    },
    AssetEnabled {
        asset: Asset,
        lp_token: LpTokenId,
    },
    AssetDisabled {
        asset: Asset,
    },
    RouteSet {
        destination_chain_id: ChainId,
        asset: Asset,
        destination_token: Address,
    },
    CrossChainContractsSet {
        chain_id: ChainId,
        adapter: String,
        spoke_pool: Address,
    },
    BondSet {
        bond_asset: Asset,
        bond_amount: u128,
    },
    LivenessSet {
        liveness_secs: u64,
    },
    IdentifierSet {
        identifier: String,
    },
    ProtocolFeeCaptureSet {
        recipient: Address,
        pct: Decimal,
    },
    Paused {
        paused: bool,
    },
}

impl HubEvent {
    #[must_use]
    pub fn kind(&self) -> HubEventKind {
        match self {
            Self::ProposeRootBundle { .. } => HubEventKind::ProposeRootBundle,
            Self::RootBundleDisputed { .. } => HubEventKind::RootBundleDisputed,
            Self::RootBundleCanceled { .. } => HubEventKind::RootBundleCanceled,
            Self::RootBundleExecuted { .. } => HubEventKind::RootBundleExecuted,
            Self::RootBundleDeleted { .. } => HubEventKind::RootBundleDeleted,
            Self::DisputeSettled { .. } => HubEventKind::DisputeSettled,
            Self::LiquidityAdded { .. } => HubEventKind::LiquidityAdded,
            Self::LiquidityRemoved { .. } => HubEventKind::LiquidityRemoved,
            Self::ProtocolFeesCaptured { .. } => HubEventKind::ProtocolFeesCaptured,
            Self::ProtocolFeesClaimed { .. } => HubEventKind::ProtocolFeesClaimed,
            Self::ReservesHaircut { .. } => HubEventKind::ReservesHaircut,
            Self::AssetEnabled { .. } => HubEventKind::AssetEnabled,
            Self::AssetDisabled { .. } => HubEventKind::AssetDisabled,
            Self::RouteSet { .. } => HubEventKind::RouteSet,
            Self::CrossChainContractsSet { .. } => HubEventKind::CrossChainContractsSet,
            Self::BondSet { .. } => HubEventKind::BondSet,
            Self::LivenessSet { .. } => HubEventKind::LivenessSet,
            Self::IdentifierSet { .. } => HubEventKind::IdentifierSet,
            Self::ProtocolFeeCaptureSet { .. } => HubEventKind::ProtocolFeeCaptureSet,
            Self::Paused { .. } => HubEventKind::Paused,
        }
    }
}
