//! In-memory adapter and oracle for tests. **Never use in production.**
//!
//! Both are cheap handles over shared state: keep a clone, hand the other
//! to the hub, and inspect or steer it from the test.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use hubledger_types::{Address, Asset, HubError, RequestHandle, Result, constants};

use crate::{
    adapter::{CrossChainAdapter, TokenRelay},
    guard::ReentrancyGuard,
    oracle::{TruthOracle, Verdict, VerdictRequest},
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// RecordingAdapter
// ---------------------------------------------------------------------------

/// A call an adapter received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Tokens(TokenRelay),
    Message { target: Address, payload: Vec<u8> },
}

#[derive(Default)]
struct AdapterState {
    calls: Vec<AdapterCall>,
    fail_next: Option<HubError>,
    reentry_guard: Option<ReentrancyGuard>,
    reentry_rejected: usize,
    reentry_admitted: usize,
}

/// Records every relay; can be told to fail or to attempt re-entry.
#[derive(Clone)]
pub struct RecordingAdapter {
    name: String,
    state: Arc<Mutex<AdapterState>>,
}

impl RecordingAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        lock(&self.state).calls.clone()
    }

    /// Fail the next call with `err` without recording it.
    pub fn fail_next_with(&self, err: HubError) {
        lock(&self.state).fail_next = Some(err);
    }

    /// On every call, try to enter `guard` as a nested settlement call would.
    pub fn attempt_reentry_into(&self, guard: ReentrancyGuard) {
        lock(&self.state).reentry_guard = Some(guard);
    }

    /// `(rejected, admitted)` re-entry attempts so far.
    pub fn reentry_attempts(&self) -> (usize, usize) {
        let state = lock(&self.state);
        (state.reentry_rejected, state.reentry_admitted)
    }

    fn record(&self, call: AdapterCall) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        if let Some(guard) = state.reentry_guard.clone() {
            match guard.enter() {
                Err(HubError::ReentrantCall) => state.reentry_rejected += 1,
                _ => state.reentry_admitted += 1,
            }
        }
        state.calls.push(call);
        Ok(())
    }
}

impl CrossChainAdapter for RecordingAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn relay_message(&mut self, target: Address, payload: &[u8]) -> Result<()> {
        self.record(AdapterCall::Message {
            target,
            payload: payload.to_vec(),
        })
    }

    fn relay_tokens(&mut self, relay: &TokenRelay) -> Result<()> {
        self.record(AdapterCall::Tokens(relay.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockOracle
// ---------------------------------------------------------------------------

#[derive(Default)]
struct OracleState {
    default_fee: u128,
    fees: HashMap<Asset, u128>,
    requests: Vec<(RequestHandle, VerdictRequest)>,
    verdicts: HashMap<RequestHandle, Verdict>,
    fail_requests: bool,
    identifiers: HashSet<String>,
    delisted: HashSet<Asset>,
}

/// Oracle with settable fees and manually resolved verdicts. Supports the
/// default identifier and whitelists every currency until told otherwise.
#[derive(Clone, Default)]
pub struct MockOracle {
    state: Arc<Mutex<OracleState>>,
}

impl MockOracle {
    pub fn new(default_fee: u128) -> Self {
        let oracle = Self::default();
        {
            let mut state = lock(&oracle.state);
            state.default_fee = default_fee;
            state.identifiers.insert(constants::DEFAULT_IDENTIFIER.to_string());
        }
        oracle
    }

    pub fn support_identifier(&self, identifier: &str) {
        lock(&self.state).identifiers.insert(identifier.to_string());
    }

    pub fn set_collateral_whitelisted(&self, currency: Asset, whitelisted: bool) {
        let mut state = lock(&self.state);
        if whitelisted {
            state.delisted.remove(&currency);
        } else {
            state.delisted.insert(currency);
        }
    }

    pub fn set_final_fee(&self, currency: Asset, fee: u128) {
        lock(&self.state).fees.insert(currency, fee);
    }

    pub fn resolve(&self, handle: RequestHandle, proposal_valid: bool) {
        lock(&self.state)
            .verdicts
            .insert(handle, Verdict { proposal_valid });
    }

    /// Make subsequent `request_verdict` calls fail.
    pub fn fail_requests(&self, fail: bool) {
        lock(&self.state).fail_requests = fail;
    }

    pub fn requests(&self) -> Vec<(RequestHandle, VerdictRequest)> {
        lock(&self.state).requests.clone()
    }
}

impl TruthOracle for MockOracle {
    fn final_fee(&self, currency: Asset) -> Result<u128> {
        let state = lock(&self.state);
        Ok(state.fees.get(&currency).copied().unwrap_or(state.default_fee))
    }

    fn request_verdict(&mut self, request: VerdictRequest) -> Result<RequestHandle> {
        let mut state = lock(&self.state);
        if state.fail_requests {
            return Err(HubError::OracleCallFailed {
                reason: "request rejected".into(),
            });
        }
        let handle = RequestHandle::new();
        state.requests.push((handle, request));
        Ok(handle)
    }

    fn settled_verdict(&self, handle: RequestHandle) -> Result<Option<Verdict>> {
        Ok(lock(&self.state).verdicts.get(&handle).copied())
    }

    fn is_identifier_supported(&self, identifier: &str) -> Result<bool> {
        Ok(lock(&self.state).identifiers.contains(identifier))
    }

    fn is_collateral_whitelisted(&self, currency: Asset) -> Result<bool> {
        Ok(!lock(&self.state).delisted.contains(&currency))
    }
}
