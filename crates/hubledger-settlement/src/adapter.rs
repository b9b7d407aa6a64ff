//! Cross-chain adapters and the per-destination registry.
//!
//! Each destination chain has one [`CrossChainAdapter`] and one destination
//! settlement contract (`spoke_pool`). Token routes map a hub asset to its
//! counterpart on a destination chain. Leaf execution builds a
//! [`RelayPlan`] and hands it to [`AdapterRegistry::dispatch`].

use std::collections::HashMap;

use hubledger_types::{Address, Asset, ChainId, Hash256, HubError, Result};

/// Domain tag of an encoded [`RootBundleMessage`].
pub const ROOT_BUNDLE_MESSAGE_TAG: &[u8] = b"hubledger:relay_root_bundle:v1:";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The roots a destination needs to execute its side of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootBundleMessage {
    pub relayer_refund_root: Hash256,
    pub slow_relay_root: Hash256,
}

impl RootBundleMessage {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ROOT_BUNDLE_MESSAGE_TAG.len() + 64);
        out.extend_from_slice(ROOT_BUNDLE_MESSAGE_TAG);
        out.extend_from_slice(self.relayer_refund_root.as_bytes());
        out.extend_from_slice(self.slow_relay_root.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let body = bytes
            .strip_prefix(ROOT_BUNDLE_MESSAGE_TAG)
            .filter(|body| body.len() == 64)
            .ok_or_else(|| {
                HubError::Serialization(format!(
                    "root bundle message: unexpected payload {}",
                    hex::encode(bytes)
                ))
            })?;
        let mut refund = [0u8; 32];
        let mut slow = [0u8; 32];
        refund.copy_from_slice(&body[..32]);
        slow.copy_from_slice(&body[32..]);
        Ok(Self {
            relayer_refund_root: Hash256(refund),
            slow_relay_root: Hash256(slow),
        })
    }
}

/// A token transfer from the hub to a destination chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRelay {
    pub l1_token: Asset,
    pub l2_token: Address,
    pub amount: u128,
    pub to: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayInstruction {
    Tokens(TokenRelay),
    Message { target: Address, payload: Vec<u8> },
}

/// Everything one leaf execution sends to its destination, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPlan {
    pub chain: ChainId,
    pub instructions: Vec<RelayInstruction>,
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// Bridge to one destination chain. Calls are one-way.
pub trait CrossChainAdapter: Send {
    fn name(&self) -> &str;

    fn relay_message(&mut self, target: Address, payload: &[u8]) -> Result<()>;

    fn relay_tokens(&mut self, relay: &TokenRelay) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Destination {
    adapter: Box<dyn CrossChainAdapter>,
    spoke_pool: Address,
}

/// Adapters, destination contracts and token routes, per destination chain.
#[derive(Default)]
pub struct AdapterRegistry {
    destinations: HashMap<ChainId, Destination>,
    routes: HashMap<(ChainId, Asset), Address>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("destinations", &self.destinations.len())
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the adapter and destination contract for `chain`.
    pub fn set_destination(
        &mut self,
        chain: ChainId,
        adapter: Box<dyn CrossChainAdapter>,
        spoke_pool: Address,
    ) {
        self.destinations.insert(
            chain,
            Destination {
                adapter,
                spoke_pool,
            },
        );
    }

    pub fn set_route(&mut self, chain: ChainId, l1_token: Asset, l2_token: Address) {
        self.routes.insert((chain, l1_token), l2_token);
    }

    /// Destination contract for `chain`.
    ///
    /// # Errors
    /// `DestinationNotConfigured` if no adapter is installed or the
    /// contract address is zero.
    pub fn spoke_pool(&self, chain: ChainId) -> Result<Address> {
        self.destinations
            .get(&chain)
            .map(|d| d.spoke_pool)
            .filter(|addr| !addr.is_zero())
            .ok_or(HubError::DestinationNotConfigured(chain))
    }

    #[must_use]
    pub fn adapter_name(&self, chain: ChainId) -> Option<&str> {
        self.destinations.get(&chain).map(|d| d.adapter.name())
    }

    /// Destination token for `l1_token` on `chain`.
    pub fn route(&self, chain: ChainId, l1_token: Asset) -> Result<Address> {
        self.routes
            .get(&(chain, l1_token))
            .copied()
            .filter(|addr| !addr.is_zero())
            .ok_or(HubError::RouteNotConfigured {
                chain,
                asset: l1_token,
            })
    }

    /// Run every instruction of `plan` through the chain's adapter.
    ///
    /// Stops at the first failure. Adapter errors other than
    /// `AdapterCallFailed` are wrapped into one.
    pub fn dispatch(&mut self, plan: &RelayPlan) -> Result<()> {
        let chain = plan.chain;
        let dest = self
            .destinations
            .get_mut(&chain)
            .ok_or(HubError::DestinationNotConfigured(chain))?;
        for instruction in &plan.instructions {
            let outcome = match instruction {
                RelayInstruction::Tokens(relay) => dest.adapter.relay_tokens(relay),
                RelayInstruction::Message { target, payload } => {
                    dest.adapter.relay_message(*target, payload)
                }
            };
            outcome.map_err(|err| match err {
                HubError::AdapterCallFailed { .. } => err,
                other => HubError::AdapterCallFailed {
                    chain,
                    reason: other.to_string(),
                },
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AdapterCall, RecordingAdapter};

    #[test]
    fn root_bundle_message_round_trip() {
        let msg = RootBundleMessage {
            relayer_refund_root: Hash256([1; 32]),
            slow_relay_root: Hash256([2; 32]),
        };
        let bytes = msg.encode();
        assert!(bytes.starts_with(ROOT_BUNDLE_MESSAGE_TAG));
        assert_eq!(RootBundleMessage::decode(&bytes).unwrap(), msg);
        assert!(RootBundleMessage::decode(&bytes[1..]).is_err());
        assert!(RootBundleMessage::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn missing_destination_and_route() {
        let mut reg = AdapterRegistry::new();
        assert!(matches!(
            reg.spoke_pool(ChainId(10)),
            Err(HubError::DestinationNotConfigured(ChainId(10)))
        ));
        reg.set_destination(ChainId(10), Box::new(RecordingAdapter::new("op")), Address::ZERO);
        assert!(reg.spoke_pool(ChainId(10)).is_err());

        let asset = Address::from_low_u64(5);
        assert!(matches!(
            reg.route(ChainId(10), asset),
            Err(HubError::RouteNotConfigured { .. })
        ));
        reg.set_route(ChainId(10), asset, Address::from_low_u64(6));
        assert_eq!(reg.route(ChainId(10), asset).unwrap(), Address::from_low_u64(6));
    }

    #[test]
    fn dispatch_runs_instructions_in_order() {
        let adapter = RecordingAdapter::new("op");
        let log = adapter.clone();
        let mut reg = AdapterRegistry::new();
        let spoke = Address::from_low_u64(0x5b);
        reg.set_destination(ChainId(10), Box::new(adapter), spoke);

        let relay = TokenRelay {
            l1_token: Address::from_low_u64(1),
            l2_token: Address::from_low_u64(2),
            amount: 100,
            to: spoke,
        };
        let plan = RelayPlan {
            chain: ChainId(10),
            instructions: vec![
                RelayInstruction::Tokens(relay.clone()),
                RelayInstruction::Message {
                    target: spoke,
                    payload: vec![1, 2, 3],
                },
            ],
        };
        reg.dispatch(&plan).unwrap();
        assert_eq!(
            log.calls(),
            vec![
                AdapterCall::Tokens(relay),
                AdapterCall::Message {
                    target: spoke,
                    payload: vec![1, 2, 3]
                },
            ]
        );
    }

    #[test]
    fn dispatch_wraps_adapter_errors() {
        let adapter = RecordingAdapter::new("op");
        adapter.fail_next_with(HubError::Internal("bridge down".into()));
        let mut reg = AdapterRegistry::new();
        reg.set_destination(ChainId(10), Box::new(adapter), Address::from_low_u64(1));
        let plan = RelayPlan {
            chain: ChainId(10),
            instructions: vec![RelayInstruction::Message {
                target: Address::from_low_u64(1),
                payload: Vec::new(),
            }],
        };
        let err = reg.dispatch(&plan).unwrap_err();
        assert!(matches!(err, HubError::AdapterCallFailed { chain: ChainId(10), .. }));
        assert!(err.to_string().contains("bridge down"));
    }
}
