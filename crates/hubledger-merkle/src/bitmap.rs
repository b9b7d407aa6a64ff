//! Claim bitmaps: one bit per leaf index, set once the leaf has executed.
//!
//! Two layouts are provided:
//! - [`BoundedClaimBitmap`]: a single 256-bit word. Indices `>= 256` are
//!   rejected with `IndexOutOfRange`.
//! - [`ClaimBitmap`]: word-indexed, `index >> 8` selects the word and
//!   `index & 255` the bit. Unbounded.
//!
//! `set_claimed` on either layout does not look at the current bit. The
//! check-then-set rule lives in [`claim`], which turns a second claim into
//! `LeafAlreadyClaimed`.

use std::collections::BTreeMap;

use hubledger_types::{ClaimBitmapKind, HubError, LeafId, Result, constants::BITMAP_WORD_BITS};
use primitive_types::U256;

/// Common interface over claim bitmap layouts.
pub trait ClaimTracker {
    fn is_claimed(&self, index: u32) -> Result<bool>;

    /// Set bit `index`. Idempotent; does not report an existing claim.
    fn set_claimed(&mut self, index: u32) -> Result<()>;

    /// Largest supported leaf count, if bounded.
    fn capacity(&self) -> Option<u32>;

    /// Hex snapshot of the claimed bits, for dispute summaries.
    fn snapshot_hex(&self) -> String;
}

/// Claim `leaf`, failing if it was already claimed.
pub fn claim<T: ClaimTracker + ?Sized>(tracker: &mut T, leaf: LeafId) -> Result<()> {
    if tracker.is_claimed(leaf.0)? {
        return Err(HubError::LeafAlreadyClaimed(leaf));
    }
    tracker.set_claimed(leaf.0)
}

fn bit_mask(bit: u32) -> U256 {
    U256::one() << bit
}

fn word_hex(word: &U256) -> String {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    hex::encode(bytes)
}

// ---------------------------------------------------------------------------
// Bounded
// ---------------------------------------------------------------------------

/// Single-word bitmap for bundles of at most 256 leaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedClaimBitmap {
    word: U256,
}

impl BoundedClaimBitmap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn word(&self) -> U256 {
        self.word
    }

    fn check_range(index: u32) -> Result<()> {
        if index >= BITMAP_WORD_BITS {
            return Err(HubError::IndexOutOfRange {
                index,
                bound: BITMAP_WORD_BITS,
            });
        }
        Ok(())
    }
}

impl ClaimTracker for BoundedClaimBitmap {
    fn is_claimed(&self, index: u32) -> Result<bool> {
        Self::check_range(index)?;
        Ok(self.word.bit(index as usize))
    }

    fn set_claimed(&mut self, index: u32) -> Result<()> {
        Self::check_range(index)?;
        self.word = self.word | bit_mask(index);
        Ok(())
    }

    fn capacity(&self) -> Option<u32> {
        Some(BITMAP_WORD_BITS)
    }

    fn snapshot_hex(&self) -> String {
        word_hex(&self.word)
    }
}

// ---------------------------------------------------------------------------
// Word-indexed
// ---------------------------------------------------------------------------

/// Sparse word-indexed bitmap with no upper bound on the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimBitmap {
    words: BTreeMap<u32, U256>,
}

impl ClaimBitmap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The word holding bit `index`; zero if never written.
    #[must_use]
    pub fn word(&self, word_index: u32) -> U256 {
        self.words.get(&word_index).copied().unwrap_or_default()
    }

    fn locate(index: u32) -> (u32, u32) {
        (index / BITMAP_WORD_BITS, index % BITMAP_WORD_BITS)
    }
}

impl ClaimTracker for ClaimBitmap {
    fn is_claimed(&self, index: u32) -> Result<bool> {
        let (word, bit) = Self::locate(index);
        Ok(self.word(word).bit(bit as usize))
    }

    fn set_claimed(&mut self, index: u32) -> Result<()> {
        let (word, bit) = Self::locate(index);
        let entry = self.words.entry(word).or_default();
        *entry = *entry | bit_mask(bit);
        Ok(())
    }

    fn capacity(&self) -> Option<u32> {
        None
    }

    /// `word_index=hex` pairs joined by `;`, in word order.
    fn snapshot_hex(&self) -> String {
        self.words
            .iter()
            .filter(|(_, w)| !w.is_zero())
            .map(|(i, w)| format!("{i}={}", word_hex(w)))
            .collect::<Vec<_>>()
            .join(";")
    }
}

// ---------------------------------------------------------------------------
// Configured layout
// ---------------------------------------------------------------------------

/// The bitmap layout selected by [`ClaimBitmapKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimBitmapTracker {
    Bounded(BoundedClaimBitmap),
    WordIndexed(ClaimBitmap),
}

impl ClaimBitmapTracker {
    #[must_use]
    pub fn new(kind: ClaimBitmapKind) -> Self {
        match kind {
            ClaimBitmapKind::Bounded => Self::Bounded(BoundedClaimBitmap::new()),
            ClaimBitmapKind::WordIndexed => Self::WordIndexed(ClaimBitmap::new()),
        }
    }

    fn inner(&self) -> &dyn ClaimTracker {
        match self {
            Self::Bounded(b) => b,
            Self::WordIndexed(b) => b,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ClaimTracker {
        match self {
            Self::Bounded(b) => b,
            Self::WordIndexed(b) => b,
        }
    }
}

impl ClaimTracker for ClaimBitmapTracker {
    fn is_claimed(&self, index: u32) -> Result<bool> {
        self.inner().is_claimed(index)
    }

    fn set_claimed(&mut self, index: u32) -> Result<()> {
        self.inner_mut().set_claimed(index)
    }

    fn capacity(&self) -> Option<u32> {
        self.inner().capacity()
    }

    fn snapshot_hex(&self) -> String {
        self.inner().snapshot_hex()
    }
}
