//! System-wide constants for the hubledger settlement hub.

/// Decimal places carried by every ratio (exchange rate, utilization, percentages).
pub const RATIO_SCALE: u32 = 18;

/// Default challenge window for a root bundle proposal, in seconds (2 hours).
pub const DEFAULT_LIVENESS_SECS: u64 = 7_200;

/// Shortest challenge window an owner may configure, in seconds.
pub const MIN_LIVENESS_SECS: u64 = 600;

/// Per-second LP fee release rate, as a decimal mantissa at [`LP_FEE_RATE_SCALE`].
///
/// `0.0000015` per second fully releases accrued fees after ~666,667 s (~7.7 days).
pub const DEFAULT_LP_FEE_RATE_MANTISSA: i64 = 15;

/// Scale of [`DEFAULT_LP_FEE_RATE_MANTISSA`].
pub const LP_FEE_RATE_SCALE: u32 = 7;

/// Bits per claim bitmap word.
pub const BITMAP_WORD_BITS: u32 = 256;

/// Default oracle price identifier for root bundle disputes.
pub const DEFAULT_IDENTIFIER: &str = "ROOT_BUNDLE_VALIDITY";

/// Default bond (excluding the oracle finality fee) in the bond asset's smallest unit.
pub const DEFAULT_BOND_AMOUNT: u128 = 5_000_000_000_000_000_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "hubledger";
