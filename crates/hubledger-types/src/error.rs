//! Error types for the hubledger settlement hub.
//!
//! All errors use the `HL_ERR_` prefix convention for easy grepping in logs.
//! Every failure is an atomic hard revert: the operation that returns an
//! error leaves no partial state behind. Error codes are grouped by kind:
//! - 1xx: Validation errors (bad proof, wrong timing, unconfigured route)
//! - 15x: Range errors (bitmap index out of bounds)
//! - 2xx: Economic guard errors (reserves, utilization, bond reconciliation)
//! - 3xx: Lifecycle errors (proposal state machine)
//! - 4xx: External call failures (adapters, oracle, reentrancy)
//! - 5xx: Authorization errors
//! - 9xx: General / internal errors

use std::fmt;

use thiserror::Error;

use crate::{Asset, ChainId, LeafId, RequestHandle, Timestamp};

/// Coarse classification of a [`HubError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Range,
    EconomicGuard,
    Lifecycle,
    ExternalCallFailure,
    Authorization,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::Range => write!(f, "RANGE"),
            Self::EconomicGuard => write!(f, "ECONOMIC_GUARD"),
            Self::Lifecycle => write!(f, "LIFECYCLE"),
            Self::ExternalCallFailure => write!(f, "EXTERNAL_CALL_FAILURE"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all hubledger operations.
#[derive(Debug, Error)]
pub enum HubError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The Merkle proof does not reproduce the committed root.
    #[error("HL_ERR_100: Bad proof for {0}")]
    InvalidProof(LeafId),

    /// The leaf was already executed within the active proposal.
    #[error("HL_ERR_101: Already claimed: {0}")]
    LeafAlreadyClaimed(LeafId),

    /// Execution attempted before the challenge period ended.
    #[error("HL_ERR_102: Not passed liveness: challenge period ends at {ends_at}, now {now}")]
    ChallengePeriodActive { ends_at: Timestamp, now: Timestamp },

    /// Dispute attempted after the challenge period ended.
    #[error("HL_ERR_103: Request passed liveness: challenge period ended at {ended_at}, now {now}")]
    ChallengePeriodElapsed { ended_at: Timestamp, now: Timestamp },

    /// No adapter or no destination contract is configured for the chain.
    #[error("HL_ERR_104: Uninitialized destination for {0}")]
    DestinationNotConfigured(ChainId),

    /// No pool rebalance route exists for (chain, asset).
    #[error("HL_ERR_105: Route not whitelisted: {asset} -> {chain}")]
    RouteNotConfigured { chain: ChainId, asset: Asset },

    /// A leaf's parallel arrays are inconsistent.
    #[error("HL_ERR_106: Malformed leaf: {reason}")]
    MalformedLeaf { reason: String },

    /// The asset is not enabled for liquidity provision.
    #[error("HL_ERR_107: Asset not enabled: {0}")]
    AssetNotEnabled(Asset),

    /// The asset is already enabled.
    #[error("HL_ERR_108: Asset already enabled: {0}")]
    AssetAlreadyEnabled(Asset),

    /// Native wrapping or unwrapping requested for a non-native asset.
    #[error("HL_ERR_109: Native transfers not supported for {0}")]
    NativeNotSupported(Asset),

    /// An amount or count argument was rejected.
    #[error("HL_ERR_110: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The hub is paused.
    #[error("HL_ERR_111: Hub is paused")]
    Paused,

    /// The oracle does not accept this asset as bond collateral.
    #[error("HL_ERR_112: Not on whitelist: {0}")]
    CollateralNotWhitelisted(Asset),

    /// The oracle does not resolve requests for this identifier.
    #[error("HL_ERR_113: Identifier not supported: {0}")]
    IdentifierNotSupported(String),

    // =================================================================
    // Range Errors (15x)
    // =================================================================
    /// A claim index lies outside the tracker's range.
    #[error("HL_ERR_150: Index {index} out of range (bound {bound})")]
    IndexOutOfRange { index: u32, bound: u32 },

    // =================================================================
    // Economic Guard Errors (2xx)
    // =================================================================
    /// A withdrawal would exceed the liquid reserves.
    #[error("HL_ERR_200: Utilization too high to remove: need {requested}, liquid {available}")]
    InsufficientLiquidReserves { requested: u128, available: i128 },

    /// Sending the amount would push utilization beyond 100%.
    #[error("HL_ERR_201: Utilization would exceed 100% for {asset}: send {requested}, liquid {available}")]
    UtilizationExceeded {
        asset: Asset,
        requested: i128,
        available: i128,
    },

    /// Bond refund and oracle stake do not add up to the posted bond.
    #[error("HL_ERR_202: Fee reconciliation mismatch: expected {expected}, got {actual}")]
    FeeReconciliationMismatch { expected: u128, actual: u128 },

    /// The holder does not own enough LP shares.
    #[error("HL_ERR_203: Insufficient LP shares: need {requested}, have {available}")]
    InsufficientShares { requested: u128, available: u128 },

    /// Fixed-point arithmetic left its representable range.
    #[error("HL_ERR_204: Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    /// The escrow does not hold enough bond to cover a release.
    #[error("HL_ERR_205: Insufficient bond escrow: need {requested}, held {available}")]
    InsufficientEscrow { requested: u128, available: u128 },

    // =================================================================
    // Lifecycle Errors (3xx)
    // =================================================================
    /// The previous proposal still has unexecuted leaves.
    #[error("HL_ERR_300: Proposal has unclaimed leafs: {remaining} remaining")]
    ProposalHasUnclaimedLeaves { remaining: u32 },

    /// No proposal is pending.
    #[error("HL_ERR_301: No pending root bundle proposal")]
    NoPendingProposal,

    /// The dispute handle is unknown or already settled.
    #[error("HL_ERR_302: Dispute not found: {0}")]
    DisputeNotFound(RequestHandle),

    /// The oracle has not resolved the request yet.
    #[error("HL_ERR_303: Verdict not yet resolved: {0}")]
    VerdictNotResolved(RequestHandle),

    /// Every leaf of the proposal has already executed.
    #[error("HL_ERR_304: Proposal fully executed")]
    ProposalFullyExecuted,

    // =================================================================
    // External Call Failures (4xx)
    // =================================================================
    /// A cross-chain adapter call reverted.
    #[error("HL_ERR_400: Adapter call failed for {chain}: {reason}")]
    AdapterCallFailed { chain: ChainId, reason: String },

    /// The truth oracle rejected a call.
    #[error("HL_ERR_401: Oracle call failed: {reason}")]
    OracleCallFailed { reason: String },

    /// Settlement re-entered while an external call was in flight.
    #[error("HL_ERR_402: Reentrant call rejected")]
    ReentrantCall,

    // =================================================================
    // Authorization Errors (5xx)
    // =================================================================
    /// The caller is not allowed to perform the operation.
    #[error("HL_ERR_500: Unauthorized caller {caller}")]
    Unauthorized { caller: crate::Address },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("HL_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("HL_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, out-of-range values, etc.).
    #[error("HL_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl HubError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidProof(_)
            | Self::LeafAlreadyClaimed(_)
            | Self::ChallengePeriodActive { .. }
            | Self::ChallengePeriodElapsed { .. }
            | Self::DestinationNotConfigured(_)
            | Self::RouteNotConfigured { .. }
            | Self::MalformedLeaf { .. }
            | Self::AssetNotEnabled(_)
            | Self::AssetAlreadyEnabled(_)
            | Self::NativeNotSupported(_)
            | Self::InvalidAmount { .. }
            | Self::Paused
            | Self::CollateralNotWhitelisted(_)
            | Self::IdentifierNotSupported(_) => ErrorKind::Validation,
            Self::IndexOutOfRange { .. } => ErrorKind::Range,
            Self::InsufficientLiquidReserves { .. }
            | Self::UtilizationExceeded { .. }
            | Self::FeeReconciliationMismatch { .. }
            | Self::InsufficientShares { .. }
            | Self::ArithmeticOverflow { .. }
            | Self::InsufficientEscrow { .. } => ErrorKind::EconomicGuard,
            Self::ProposalHasUnclaimedLeaves { .. }
            | Self::NoPendingProposal
            | Self::DisputeNotFound(_)
            | Self::VerdictNotResolved(_)
            | Self::ProposalFullyExecuted => ErrorKind::Lifecycle,
            Self::AdapterCallFailed { .. } | Self::OracleCallFailed { .. } | Self::ReentrantCall => {
                ErrorKind::ExternalCallFailure
            }
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, HubError>;

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
