//! Truth oracle boundary.
//!
//! The hub asks the oracle for the finality fee it charges per request
//! (folded into every bond) and for a verdict on disputed proposals.
//! Verdicts resolve later; the hub polls with [`TruthOracle::settled_verdict`].
//! Admin changes to the bond currency and dispute identifier are checked
//! against the oracle's whitelists first.

use hubledger_types::{Address, Asset, RequestHandle, Result, Timestamp};
use serde::{Deserialize, Serialize};

/// Dispute submitted to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRequest {
    pub identifier: String,
    pub request_time: Timestamp,
    /// Flat `key:value` summary of the disputed proposal.
    pub ancillary_data: String,
    pub proposer: Address,
    pub disputer: Address,
    pub currency: Asset,
    /// Bond each side stakes, finality fee included.
    pub stake: u128,
    pub final_fee: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the disputed proposal was correct.
    pub proposal_valid: bool,
}

pub trait TruthOracle: Send {
    /// Fee the oracle keeps from every resolved request in `currency`.
    fn final_fee(&self, currency: Asset) -> Result<u128>;

    fn request_verdict(&mut self, request: VerdictRequest) -> Result<RequestHandle>;

    /// `None` until the verdict for `handle` is final.
    fn settled_verdict(&self, handle: RequestHandle) -> Result<Option<Verdict>>;

    fn is_identifier_supported(&self, identifier: &str) -> Result<bool>;

    /// Whether `currency` is accepted as bond collateral.
    fn is_collateral_whitelisted(&self, currency: Asset) -> Result<bool>;
}
