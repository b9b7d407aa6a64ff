//! Leaf schemas committed into root bundle Merkle trees.
//!
//! A root bundle carries three roots, one per tree:
//! - the **pool rebalance** tree, executed on the hub ([`PoolRebalanceLeaf`])
//! - the **relayer refund** tree, executed at the destination ([`RelayerRefundLeaf`])
//! - the **slow fill** tree, executed at the destination ([`SlowFillLeaf`])
//!
//! All three share one verifier, so their encodings are domain-separated
//! (see `hubledger-merkle`).

use serde::{Deserialize, Serialize};

use crate::{Address, Asset, ChainId, Hash256, HubError, LeafId, Result};

/// Rebalance instructions for one destination chain.
///
/// `l1_tokens`, `bundle_lp_fees` and `net_send_amounts` are parallel arrays.
/// `running_balances` is either the same length or twice as long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRebalanceLeaf {
    pub destination_chain_id: ChainId,
    /// Grouping hint from the bundle builder; execution does not depend on it.
    pub group_index: u32,
    pub leaf_id: LeafId,
    pub l1_tokens: Vec<Asset>,
    pub bundle_lp_fees: Vec<u128>,
    /// Positive: sent from the hub. Negative: to be returned to the hub.
    pub net_send_amounts: Vec<i128>,
    pub running_balances: Vec<i128>,
}

impl PoolRebalanceLeaf {
    /// Check that the parallel arrays line up.
    pub fn validate_shape(&self) -> Result<()> {
        let n = self.l1_tokens.len();
        if self.bundle_lp_fees.len() != n || self.net_send_amounts.len() != n {
            return Err(HubError::MalformedLeaf {
                reason: format!(
                    "{}: {} tokens, {} fees, {} net sends",
                    self.leaf_id,
                    n,
                    self.bundle_lp_fees.len(),
                    self.net_send_amounts.len()
                ),
            });
        }
        let running = self.running_balances.len();
        if running != n && running != 2 * n {
            return Err(HubError::MalformedLeaf {
                reason: format!(
                    "{}: running balances length {running} for {n} tokens",
                    self.leaf_id
                ),
            });
        }
        Ok(())
    }

    /// Iterate `(asset, lp_fee, net_send)` per entry.
    pub fn entries(&self) -> impl Iterator<Item = (Asset, u128, i128)> + '_ {
        self.l1_tokens
            .iter()
            .zip(&self.bundle_lp_fees)
            .zip(&self.net_send_amounts)
            .map(|((asset, fee), net)| (*asset, *fee, *net))
    }
}

/// Refunds paid to relayers on a destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerRefundLeaf {
    /// Amount the destination returns to the hub.
    pub amount_to_return: u128,
    pub chain_id: ChainId,
    pub refund_amounts: Vec<u128>,
    pub leaf_id: LeafId,
    pub l2_token: Address,
    pub refund_addresses: Vec<Address>,
}

impl RelayerRefundLeaf {
    pub fn validate_shape(&self) -> Result<()> {
        if self.refund_amounts.len() != self.refund_addresses.len() {
            return Err(HubError::MalformedLeaf {
                reason: format!(
                    "{}: {} refund amounts for {} addresses",
                    self.leaf_id,
                    self.refund_amounts.len(),
                    self.refund_addresses.len()
                ),
            });
        }
        Ok(())
    }
}

/// A deposit filled from destination-chain liquidity instead of a relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowFillLeaf {
    pub depositor: Address,
    pub recipient: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub input_amount: u128,
    pub output_amount: u128,
    pub origin_chain_id: ChainId,
    pub deposit_id: u64,
    pub fill_deadline: u32,
    pub message: Vec<u8>,
    pub chain_id: ChainId,
    pub updated_output_amount: u128,
}

impl SlowFillLeaf {
    /// Hash of the attached message, as committed in the leaf encoding.
    #[must_use]
    pub fn message_hash(&self) -> Hash256 {
        use sha2::{Digest, Sha256};
        if self.message.is_empty() {
            return Hash256::ZERO;
        }
        let mut hasher = Sha256::new();
        hasher.update(&self.message);
        Hash256(hasher.finalize().into())
    }
}
