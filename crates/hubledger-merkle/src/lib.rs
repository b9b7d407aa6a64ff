//! # hubledger-merkle
//!
//! Leaf commitment primitives for root bundles:
//!
//! - [`encoding`]: canonical, domain-separated leaf encodings ([`MerkleLeaf`])
//! - [`verifier`]: sorted-pair proof verification ([`verify`])
//! - [`tree`]: a [`MerkleTree`] builder producing roots and proofs
//! - [`bitmap`]: claim bitmaps guaranteeing each leaf executes once
//!
//! Everything here is pure and synchronous.

pub mod bitmap;
pub mod encoding;
pub mod tree;
pub mod verifier;

pub use bitmap::{BoundedClaimBitmap, ClaimBitmap, ClaimBitmapTracker, ClaimTracker, claim};
pub use encoding::{LeafEncoder, MerkleLeaf};
pub use tree::MerkleTree;
pub use verifier::{hash_pair, process_proof, verify, verify_hash};
