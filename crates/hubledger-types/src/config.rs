//! Configuration for a hub instance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, Asset, HubError, Result, constants, fixed_point};

/// Which claim bitmap layout a proposal uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimBitmapKind {
    /// One 256-bit word; bundles are limited to 256 leaves.
    Bounded,
    /// Word-indexed map; unbounded leaf count.
    #[default]
    WordIndexed,
}

/// Configuration for a single hub instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Account allowed to run admin operations.
    pub owner: Address,
    /// Challenge window applied to each proposal, in seconds.
    #[serde(default = "default_liveness")]
    pub liveness_secs: u64,
    /// Token proposers bond in.
    pub bond_asset: Asset,
    /// Bond excluding the oracle finality fee, in the bond asset's smallest unit.
    #[serde(default = "default_bond_amount")]
    pub bond_amount: u128,
    /// Oracle price identifier used for disputes.
    #[serde(default = "default_identifier")]
    pub identifier: String,
    /// Recipient of captured protocol fees.
    pub protocol_fee_recipient: Address,
    /// Share of each bundle LP fee captured by the protocol, in `[0, 1]`.
    #[serde(default)]
    pub protocol_fee_capture_pct: Decimal,
    /// Fraction of undistributed LP fees released per elapsed second.
    #[serde(default = "default_lp_fee_rate")]
    pub lp_fee_rate_per_second: Decimal,
    /// Wrapped form of the hub chain's native asset, if any.
    #[serde(default)]
    pub wrapped_native_asset: Option<Asset>,
    /// Claim bitmap layout for new proposals.
    #[serde(default)]
    pub claim_bitmap: ClaimBitmapKind,
}

fn default_liveness() -> u64 {
    constants::DEFAULT_LIVENESS_SECS
}

fn default_bond_amount() -> u128 {
    constants::DEFAULT_BOND_AMOUNT
}

fn default_identifier() -> String {
    constants::DEFAULT_IDENTIFIER.to_string()
}

fn default_lp_fee_rate() -> Decimal {
    Decimal::new(
        constants::DEFAULT_LP_FEE_RATE_MANTISSA,
        constants::LP_FEE_RATE_SCALE,
    )
}

impl HubConfig {
    /// Config with defaults for everything but the owner and bond asset.
    /// The owner also receives protocol fees.
    #[must_use]
    pub fn new(owner: Address, bond_asset: Asset) -> Self {
        Self {
            owner,
            liveness_secs: default_liveness(),
            bond_asset,
            bond_amount: default_bond_amount(),
            identifier: default_identifier(),
            protocol_fee_recipient: owner,
            protocol_fee_capture_pct: Decimal::ZERO,
            lp_fee_rate_per_second: default_lp_fee_rate(),
            wrapped_native_asset: None,
            claim_bitmap: ClaimBitmapKind::default(),
        }
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the hub cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.liveness_secs < constants::MIN_LIVENESS_SECS {
            return Err(HubError::Configuration(format!(
                "Liveness too short: {} < {}",
                self.liveness_secs,
                constants::MIN_LIVENESS_SECS
            )));
        }
        if !fixed_point::is_unit_interval(self.protocol_fee_capture_pct) {
            return Err(HubError::Configuration(format!(
                "protocol_fee_capture_pct out of range: {}",
                self.protocol_fee_capture_pct
            )));
        }
        if !fixed_point::is_unit_interval(self.lp_fee_rate_per_second)
            || self.lp_fee_rate_per_second.is_zero()
        {
            return Err(HubError::Configuration(format!(
                "lp_fee_rate_per_second out of range: {}",
                self.lp_fee_rate_per_second
            )));
        }
        if self.identifier.is_empty() {
            return Err(HubError::Configuration("identifier is empty".into()));
        }
        Ok(())
    }
}
