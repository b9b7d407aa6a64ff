//! Canonical leaf encoding.
//!
//! Every leaf schema serialises to a fixed field order with big-endian
//! integers and length-prefixed sequences. The leaf hash is
//! `SHA-256(domain || encoding)`, where `domain` differs per schema, so a
//! refund leaf can never verify against a pool rebalance root and vice versa.

use hubledger_types::{
    Address, ChainId, Hash256, LeafId, PoolRebalanceLeaf, RelayerRefundLeaf, SlowFillLeaf,
};
use sha2::{Digest, Sha256};

/// Domain tag for pool rebalance leaves.
pub const POOL_REBALANCE_DOMAIN: &[u8] = b"hubledger:leaf:pool_rebalance:v1:";
/// Domain tag for relayer refund leaves.
pub const RELAYER_REFUND_DOMAIN: &[u8] = b"hubledger:leaf:relayer_refund:v1:";
/// Domain tag for slow fill leaves.
pub const SLOW_FILL_DOMAIN: &[u8] = b"hubledger:leaf:slow_fill:v1:";

/// A value that can be committed as a Merkle leaf.
pub trait MerkleLeaf {
    /// Schema tag prepended before hashing.
    const DOMAIN: &'static [u8];

    /// Write the canonical field encoding.
    fn encode_into(&self, enc: &mut LeafEncoder);

    /// Canonical bytes, without the domain tag.
    fn encode(&self) -> Vec<u8> {
        let mut enc = LeafEncoder::default();
        self.encode_into(&mut enc);
        enc.finish()
    }

    /// `SHA-256(DOMAIN || encode())`.
    fn leaf_hash(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update(Self::DOMAIN);
        hasher.update(self.encode());
        Hash256(hasher.finalize().into())
    }
}

/// Append-only byte writer for canonical encodings.
#[derive(Debug, Default)]
pub struct LeafEncoder {
    buf: Vec<u8>,
}

impl LeafEncoder {
    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_u128(&mut self, v: u128) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_i128(&mut self, v: i128) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_address(&mut self, a: &Address) -> &mut Self {
        self.buf.extend_from_slice(a.as_bytes());
        self
    }

    pub fn put_hash(&mut self, h: &Hash256) -> &mut Self {
        self.buf.extend_from_slice(h.as_bytes());
        self
    }

    pub fn put_chain(&mut self, c: ChainId) -> &mut Self {
        self.put_u64(c.0)
    }

    pub fn put_leaf_id(&mut self, id: LeafId) -> &mut Self {
        self.put_u32(id.0)
    }

    /// Sequence lengths are written as `u32`. Leaf arrays never approach that.
    #[allow(clippy::cast_possible_truncation)]
    fn put_len(&mut self, len: usize) -> &mut Self {
        self.put_u32(len as u32)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.put_len(bytes.len());
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_addresses(&mut self, items: &[Address]) -> &mut Self {
        self.put_len(items.len());
        for a in items {
            self.put_address(a);
        }
        self
    }

    pub fn put_u128s(&mut self, items: &[u128]) -> &mut Self {
        self.put_len(items.len());
        for v in items {
            self.put_u128(*v);
        }
        self
    }

    pub fn put_i128s(&mut self, items: &[i128]) -> &mut Self {
        self.put_len(items.len());
        for v in items {
            self.put_i128(*v);
        }
        self
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

impl MerkleLeaf for PoolRebalanceLeaf {
    const DOMAIN: &'static [u8] = POOL_REBALANCE_DOMAIN;

    fn encode_into(&self, enc: &mut LeafEncoder) {
        enc.put_chain(self.destination_chain_id)
            .put_u128s(&self.bundle_lp_fees)
            .put_i128s(&self.net_send_amounts)
            .put_i128s(&self.running_balances)
            .put_u32(self.group_index)
            .put_leaf_id(self.leaf_id)
            .put_addresses(&self.l1_tokens);
    }
}

impl MerkleLeaf for RelayerRefundLeaf {
    const DOMAIN: &'static [u8] = RELAYER_REFUND_DOMAIN;

    fn encode_into(&self, enc: &mut LeafEncoder) {
        enc.put_u128(self.amount_to_return)
            .put_chain(self.chain_id)
            .put_u128s(&self.refund_amounts)
            .put_leaf_id(self.leaf_id)
            .put_address(&self.l2_token)
            .put_addresses(&self.refund_addresses);
    }
}

impl MerkleLeaf for SlowFillLeaf {
    const DOMAIN: &'static [u8] = SLOW_FILL_DOMAIN;

    fn encode_into(&self, enc: &mut LeafEncoder) {
        enc.put_address(&self.depositor)
            .put_address(&self.recipient)
            .put_address(&self.input_token)
            .put_address(&self.output_token)
            .put_u128(self.input_amount)
            .put_u128(self.output_amount)
            .put_chain(self.origin_chain_id)
            .put_u64(self.deposit_id)
            .put_u32(self.fill_deadline)
            .put_hash(&self.message_hash())
            .put_chain(self.chain_id)
            .put_u128(self.updated_output_amount);
    }
}
