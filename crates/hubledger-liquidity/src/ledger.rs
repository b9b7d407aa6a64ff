//! Pooled reserve accounting.
//!
//! Each enabled asset has an [`AssetBook`]: the public [`PooledTokenState`]
//! plus the hub's token balance for that asset (`vault_balance`) and the
//! protocol fees captured but not yet claimed.
//!
//! Every operation either completes or returns an error with the ledger
//! unchanged. Single-asset operations work on a copy of the book and write
//! it back on success; leaf execution stages its changes in a
//! [`LedgerTransaction`] that the caller commits once all external calls
//! have succeeded.

use std::collections::{BTreeMap, btree_map::Entry};

use hubledger_types::{
    Address, Asset, HubConfig, HubError, LpTokenId, PooledTokenState, Result, Timestamp,
    fixed_point,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::shares::LpShareLedger;

fn overflow(context: &'static str) -> HubError {
    HubError::ArithmeticOverflow { context }
}

fn signed(value: u128, context: &'static str) -> Result<i128> {
    i128::try_from(value).map_err(|_| overflow(context))
}

fn non_negative(value: i128) -> u128 {
    u128::try_from(value.max(0)).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// FeeSchedule
// ---------------------------------------------------------------------------

/// Fee parameters shared by every pooled asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub lp_fee_rate_per_second: Decimal,
    pub protocol_fee_capture_pct: Decimal,
    pub protocol_fee_recipient: Address,
}

impl FeeSchedule {
    #[must_use]
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            lp_fee_rate_per_second: config.lp_fee_rate_per_second,
            protocol_fee_capture_pct: config.protocol_fee_capture_pct,
            protocol_fee_recipient: config.protocol_fee_recipient,
        }
    }
}

/// How one bundle LP fee was split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeCapture {
    pub asset: Asset,
    pub lp_fees: u128,
    pub protocol_fees: u128,
}

// ---------------------------------------------------------------------------
// AssetBook
// ---------------------------------------------------------------------------

/// Reserve state and token custody for one pooled asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBook {
    pub state: PooledTokenState,
    /// Tokens of this asset held by the hub.
    pub vault_balance: u128,
    pub unclaimed_protocol_fees: u128,
}

impl AssetBook {
    fn new(asset: Asset, now: Timestamp) -> Self {
        Self {
            state: PooledTokenState::new(asset, now),
            vault_balance: 0,
            unclaimed_protocol_fees: 0,
        }
    }

    /// Release `min(undistributed * rate * elapsed, undistributed)` and
    /// stamp the update time. Returns the amount released.
    fn release_lp_fees(&mut self, now: Timestamp, rate_per_second: Decimal) -> Result<u128> {
        let elapsed = now.secs_since(self.state.last_lp_fee_update);
        let undistributed = self.state.undistributed_lp_fees;
        let released = fixed_point::portion_floor(undistributed, rate_per_second, elapsed)?;
        self.state.undistributed_lp_fees = undistributed - released;
        self.state.last_lp_fee_update = now;
        Ok(released)
    }

    /// Move any difference between held tokens and `liquid_reserves` over
    /// from `utilized_reserves`. Returns the signed adjustment.
    fn reconcile_drift(&mut self) -> Result<i128> {
        let held = signed(self.vault_balance, "vault balance")?
            .checked_sub(signed(self.unclaimed_protocol_fees, "protocol fees")?)
            .ok_or_else(|| overflow("held balance"))?;
        let delta = held
            .checked_sub(self.state.liquid_reserves)
            .ok_or_else(|| overflow("drift"))?;
        if delta != 0 {
            self.state.liquid_reserves = held;
            self.state.utilized_reserves = self
                .state
                .utilized_reserves
                .checked_sub(delta)
                .ok_or_else(|| overflow("drift"))?;
        }
        Ok(delta)
    }

    fn sync(&mut self, now: Timestamp, rate_per_second: Decimal) -> Result<()> {
        let released = self.release_lp_fees(now, rate_per_second)?;
        let drift = self.reconcile_drift()?;
        if released > 0 || drift != 0 {
            debug!(
                asset = %self.state.asset,
                released,
                drift,
                liquid = self.state.liquid_reserves,
                utilized = self.state.utilized_reserves,
                undistributed = self.state.undistributed_lp_fees,
                "pool synced"
            );
        }
        Ok(())
    }

    /// `(liquid + utilized - undistributed) / supply`, 1.0 with no supply.
    fn exchange_rate(&self, lp_supply: u128) -> Result<Decimal> {
        if lp_supply == 0 {
            return Ok(Decimal::ONE);
        }
        let backing = self
            .state
            .backing_value()
            .ok_or_else(|| overflow("exchange rate"))?;
        fixed_point::ratio(non_negative(backing), lp_supply)
    }

    fn utilization_post_relay(&self, relayed: u128) -> Result<Decimal> {
        let utilized = non_negative(self.state.utilized_reserves);
        let numerator = relayed
            .checked_add(utilized)
            .ok_or_else(|| overflow("utilization"))?;
        if numerator == 0 {
            return Ok(Decimal::ZERO);
        }
        let denominator = non_negative(self.state.liquid_reserves)
            .checked_add(utilized)
            .ok_or_else(|| overflow("utilization"))?;
        if denominator == 0 {
            return Ok(Decimal::ONE);
        }
        fixed_point::ratio(numerator, denominator)
    }

    /// Move a positive net send out of liquid reserves.
    ///
    /// Negative net sends are not booked here: the returned tokens enter
    /// the pool through drift reconciliation once they land on the hub.
    fn apply_net_send(&mut self, net_send: i128) -> Result<()> {
        if net_send <= 0 {
            return Ok(());
        }
        if net_send > self.state.liquid_reserves {
            return Err(HubError::UtilizationExceeded {
                asset: self.state.asset,
                requested: net_send,
                available: self.state.liquid_reserves,
            });
        }
        let sent = non_negative(net_send);
        self.vault_balance = self
            .vault_balance
            .checked_sub(sent)
            .ok_or_else(|| overflow("vault balance"))?;
        self.state.liquid_reserves -= net_send;
        self.state.utilized_reserves = self
            .state
            .utilized_reserves
            .checked_add(net_send)
            .ok_or_else(|| overflow("utilized reserves"))?;
        Ok(())
    }

    fn allocate_fees(&mut self, bundle_lp_fee: u128, capture_pct: Decimal) -> Result<FeeCapture> {
        let protocol_fees = fixed_point::mul_floor(bundle_lp_fee, capture_pct)?;
        let lp_fees = bundle_lp_fee - protocol_fees;
        self.state.undistributed_lp_fees = self
            .state
            .undistributed_lp_fees
            .checked_add(lp_fees)
            .ok_or_else(|| overflow("undistributed fees"))?;
        self.state.utilized_reserves = self
            .state
            .utilized_reserves
            .checked_add(signed(lp_fees, "lp fees")?)
            .ok_or_else(|| overflow("utilized reserves"))?;
        self.unclaimed_protocol_fees = self
            .unclaimed_protocol_fees
            .checked_add(protocol_fees)
            .ok_or_else(|| overflow("protocol fees"))?;
        Ok(FeeCapture {
            asset: self.state.asset,
            lp_fees,
            protocol_fees,
        })
    }
}

// ---------------------------------------------------------------------------
// LiquidityLedger
// ---------------------------------------------------------------------------

/// Pooled reserves, LP shares and fee accrual for every asset on the hub.
#[derive(Debug, Clone)]
pub struct LiquidityLedger {
    books: BTreeMap<Asset, AssetBook>,
    shares: LpShareLedger,
    fees: FeeSchedule,
    wrapped_native: Option<Asset>,
}

impl LiquidityLedger {
    #[must_use]
    pub fn new(fees: FeeSchedule, wrapped_native: Option<Asset>) -> Self {
        Self {
            books: BTreeMap::new(),
            shares: LpShareLedger::new(),
            fees,
            wrapped_native,
        }
    }

    #[must_use]
    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(FeeSchedule::from_config(config), config.wrapped_native_asset)
    }

    // ----- Queries -----

    #[must_use]
    pub fn book(&self, asset: Asset) -> Option<&AssetBook> {
        self.books.get(&asset)
    }

    #[must_use]
    pub fn pooled_token(&self, asset: Asset) -> Option<&PooledTokenState> {
        self.books.get(&asset).map(|b| &b.state)
    }

    #[must_use]
    pub fn is_enabled(&self, asset: Asset) -> bool {
        self.books.get(&asset).is_some_and(|b| b.state.is_enabled)
    }

    #[must_use]
    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    #[must_use]
    pub fn unclaimed_protocol_fees(&self, asset: Asset) -> u128 {
        self.books
            .get(&asset)
            .map_or(0, |b| b.unclaimed_protocol_fees)
    }

    #[must_use]
    pub fn vault_balance(&self, asset: Asset) -> u128 {
        self.books.get(&asset).map_or(0, |b| b.vault_balance)
    }

    #[must_use]
    pub fn lp_balance(&self, asset: Asset, holder: Address) -> u128 {
        self.shares
            .balance_of(LpTokenId::for_asset(asset), holder)
    }

    #[must_use]
    pub fn lp_supply(&self, asset: Asset) -> u128 {
        self.shares.total_supply(LpTokenId::for_asset(asset))
    }

    fn existing_book(&self, asset: Asset) -> Result<AssetBook> {
        self.books
            .get(&asset)
            .cloned()
            .ok_or(HubError::AssetNotEnabled(asset))
    }

    fn enabled_book(&self, asset: Asset) -> Result<AssetBook> {
        let book = self.existing_book(asset)?;
        if !book.state.is_enabled {
            return Err(HubError::AssetNotEnabled(asset));
        }
        Ok(book)
    }

    // ----- Asset lifecycle -----

    /// Enable `asset` for liquidity provision. Re-enabling a disabled asset
    /// keeps its reserves and LP token.
    pub fn enable_asset(&mut self, asset: Asset, now: Timestamp) -> Result<LpTokenId> {
        match self.books.entry(asset) {
            Entry::Occupied(mut entry) => {
                let book = entry.get_mut();
                if book.state.is_enabled {
                    return Err(HubError::AssetAlreadyEnabled(asset));
                }
                book.state.is_enabled = true;
                info!(%asset, "asset re-enabled");
                Ok(book.state.lp_token)
            }
            Entry::Vacant(entry) => {
                let book = entry.insert(AssetBook::new(asset, now));
                info!(%asset, lp_token = %book.state.lp_token, "asset enabled");
                Ok(book.state.lp_token)
            }
        }
    }

    pub fn disable_asset(&mut self, asset: Asset) -> Result<()> {
        let book = self
            .books
            .get_mut(&asset)
            .ok_or(HubError::AssetNotEnabled(asset))?;
        book.state.is_enabled = false;
        info!(%asset, "asset disabled");
        Ok(())
    }

    // ----- Sync, rate, utilization -----

    /// Release accrued LP fees and reconcile held tokens for `asset`.
    pub fn sync(&mut self, asset: Asset, now: Timestamp) -> Result<()> {
        let mut book = self.existing_book(asset)?;
        book.sync(now, self.fees.lp_fee_rate_per_second)?;
        self.books.insert(asset, book);
        Ok(())
    }

    /// Sync, then return the LP token exchange rate.
    pub fn exchange_rate_current(&mut self, asset: Asset, now: Timestamp) -> Result<Decimal> {
        self.sync(asset, now)?;
        let supply = self.lp_supply(asset);
        self.existing_book(asset)?.exchange_rate(supply)
    }

    pub fn liquidity_utilization_current(&mut self, asset: Asset, now: Timestamp) -> Result<Decimal> {
        self.liquidity_utilization_post_relay(asset, 0, now)
    }

    /// Utilization if `relayed` more tokens were sent out right now.
    pub fn liquidity_utilization_post_relay(
        &mut self,
        asset: Asset,
        relayed: u128,
        now: Timestamp,
    ) -> Result<Decimal> {
        self.sync(asset, now)?;
        self.existing_book(asset)?.utilization_post_relay(relayed)
    }

    // ----- LP operations -----

    /// Deposit `amount` of `asset` and mint LP shares at the current rate.
    ///
    /// `native` marks a deposit of the hub chain's native asset, which is
    /// only accepted for the configured wrapped-native asset.
    pub fn add_liquidity(
        &mut self,
        asset: Asset,
        provider: Address,
        amount: u128,
        native: bool,
        now: Timestamp,
    ) -> Result<u128> {
        if native && self.wrapped_native != Some(asset) {
            return Err(HubError::NativeNotSupported(asset));
        }
        if amount == 0 {
            return Err(HubError::InvalidAmount {
                reason: "liquidity amount must be positive".into(),
            });
        }
        let mut book = self.enabled_book(asset)?;
        book.sync(now, self.fees.lp_fee_rate_per_second)?;
        let rate = book.exchange_rate(self.shares.total_supply(book.state.lp_token))?;
        let minted = fixed_point::div_floor(amount, rate)?;

        book.vault_balance = book
            .vault_balance
            .checked_add(amount)
            .ok_or_else(|| overflow("vault balance"))?;
        book.state.liquid_reserves = book
            .state
            .liquid_reserves
            .checked_add(signed(amount, "liquid reserves")?)
            .ok_or_else(|| overflow("liquid reserves"))?;

        self.shares.mint(book.state.lp_token, provider, minted)?;
        self.books.insert(asset, book);
        info!(%asset, %provider, amount, minted, %rate, native, "liquidity added");
        Ok(minted)
    }

    /// Burn `shares` and return the underlying amount at the current rate.
    ///
    /// Fails when the payout exceeds liquid reserves. `want_native` asks
    /// for the payout unwrapped and requires the wrapped-native asset.
    pub fn remove_liquidity(
        &mut self,
        asset: Asset,
        provider: Address,
        shares: u128,
        want_native: bool,
        now: Timestamp,
    ) -> Result<u128> {
        if want_native && self.wrapped_native != Some(asset) {
            return Err(HubError::NativeNotSupported(asset));
        }
        let mut book = self.enabled_book(asset)?;
        let lp_token = book.state.lp_token;
        self.shares.ensure_balance(lp_token, provider, shares)?;

        book.sync(now, self.fees.lp_fee_rate_per_second)?;
        let rate = book.exchange_rate(self.shares.total_supply(lp_token))?;
        let amount = fixed_point::mul_floor(shares, rate)?;
        let payout = signed(amount, "payout")?;
        if payout > book.state.liquid_reserves {
            return Err(HubError::InsufficientLiquidReserves {
                requested: amount,
                available: book.state.liquid_reserves,
            });
        }

        book.state.liquid_reserves -= payout;
        book.vault_balance = book
            .vault_balance
            .checked_sub(amount)
            .ok_or_else(|| overflow("vault balance"))?;

        self.shares.burn(lp_token, provider, shares)?;
        self.books.insert(asset, book);
        info!(%asset, %provider, shares, amount, %rate, want_native, "liquidity removed");
        Ok(amount)
    }

    // ----- Custody and fees -----

    /// Record tokens arriving on the hub outside of LP deposits (bridge
    /// returns, gifts). Picked up by the next sync.
    pub fn record_external_transfer(&mut self, asset: Asset, amount: u128) -> Result<()> {
        let book = self
            .books
            .get_mut(&asset)
            .ok_or(HubError::AssetNotEnabled(asset))?;
        book.vault_balance = book
            .vault_balance
            .checked_add(amount)
            .ok_or_else(|| overflow("vault balance"))?;
        debug!(%asset, amount, vault = book.vault_balance, "external transfer recorded");
        Ok(())
    }

    /// Pay out all unclaimed protocol fees for `asset`. Returns the
    /// recipient and the amount paid.
    pub fn claim_protocol_fees(&mut self, asset: Asset) -> Result<(Address, u128)> {
        let recipient = self.fees.protocol_fee_recipient;
        let book = self
            .books
            .get_mut(&asset)
            .ok_or(HubError::AssetNotEnabled(asset))?;
        let amount = book.unclaimed_protocol_fees;
        if amount == 0 {
            return Ok((recipient, 0));
        }
        book.vault_balance = book
            .vault_balance
            .checked_sub(amount)
            .ok_or(HubError::InsufficientEscrow {
                requested: amount,
                available: book.vault_balance,
            })?;
        book.unclaimed_protocol_fees = 0;
        info!(%asset, %recipient, amount, "protocol fees claimed");
        Ok((recipient, amount))
    }

    /// Write `amount` off utilized reserves, socialising a loss across LPs.
    pub fn haircut_reserves(&mut self, asset: Asset, amount: i128, now: Timestamp) -> Result<()> {
        let mut book = self.existing_book(asset)?;
        book.sync(now, self.fees.lp_fee_rate_per_second)?;
        book.state.utilized_reserves = book
            .state
            .utilized_reserves
            .checked_sub(amount)
            .ok_or_else(|| overflow("utilized reserves"))?;
        self.books.insert(asset, book);
        info!(%asset, amount, "reserves haircut");
        Ok(())
    }

    pub fn set_protocol_fee_capture(&mut self, recipient: Address, pct: Decimal) -> Result<()> {
        if !fixed_point::is_unit_interval(pct) {
            return Err(HubError::InvalidAmount {
                reason: format!("Bad protocolFeeCapturePct: {pct}"),
            });
        }
        if recipient.is_zero() {
            return Err(HubError::InvalidAmount {
                reason: "protocol fee recipient is the zero address".into(),
            });
        }
        self.fees.protocol_fee_capture_pct = pct;
        self.fees.protocol_fee_recipient = recipient;
        Ok(())
    }

    // ----- Staged leaf effects -----

    /// Start staging leaf effects against the current state.
    #[must_use]
    pub fn begin(&self, now: Timestamp) -> LedgerTransaction<'_> {
        LedgerTransaction {
            ledger: self,
            staged: BTreeMap::new(),
            captures: Vec::new(),
            now,
        }
    }

    /// Apply staged changes. Returns the fee splits they contained.
    pub fn commit(&mut self, staged: StagedLedger) -> Vec<FeeCapture> {
        for (asset, book) in staged.books {
            debug!(
                %asset,
                liquid = book.state.liquid_reserves,
                utilized = book.state.utilized_reserves,
                undistributed = book.state.undistributed_lp_fees,
                "ledger commit"
            );
            self.books.insert(asset, book);
        }
        staged.captures
    }
}

// ---------------------------------------------------------------------------
// LedgerTransaction
// ---------------------------------------------------------------------------

/// Leaf effects computed against a snapshot of the ledger.
///
/// Nothing is written until the result of [`finish`](Self::finish) is passed
/// to [`LiquidityLedger::commit`]. Dropping the transaction discards it.
#[derive(Debug)]
pub struct LedgerTransaction<'a> {
    ledger: &'a LiquidityLedger,
    staged: BTreeMap<Asset, AssetBook>,
    captures: Vec<FeeCapture>,
    now: Timestamp,
}

impl LedgerTransaction<'_> {
    /// Stage one `(asset, lp_fee, net_send)` entry of a pool rebalance leaf:
    /// sync, send out positive net sends, then split the fee.
    pub fn apply_leaf_entry(&mut self, asset: Asset, bundle_lp_fee: u128, net_send: i128) -> Result<()> {
        let book = match self.staged.entry(asset) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.ledger.existing_book(asset)?),
        };
        let fees = &self.ledger.fees;
        book.sync(self.now, fees.lp_fee_rate_per_second)?;
        book.apply_net_send(net_send)?;
        let capture = book.allocate_fees(bundle_lp_fee, fees.protocol_fee_capture_pct)?;
        debug!(
            %asset,
            net_send,
            lp_fees = capture.lp_fees,
            protocol_fees = capture.protocol_fees,
            "leaf entry staged"
        );
        self.captures.push(capture);
        Ok(())
    }

    /// Staged view of `asset`, falling back to committed state.
    #[must_use]
    pub fn book(&self, asset: Asset) -> Option<&AssetBook> {
        self.staged.get(&asset).or_else(|| self.ledger.book(asset))
    }

    #[must_use]
    pub fn finish(self) -> StagedLedger {
        StagedLedger {
            books: self.staged,
            captures: self.captures,
        }
    }
}

/// Owned result of a [`LedgerTransaction`], ready to commit.
#[derive(Debug, Clone)]
pub struct StagedLedger {
    books: BTreeMap<Asset, AssetBook>,
    captures: Vec<FeeCapture>,
}

impl StagedLedger {
    #[must_use]
    pub fn captures(&self) -> &[FeeCapture] {
        &self.captures
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
