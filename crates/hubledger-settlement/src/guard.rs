//! Reentrancy guard for settlement entry points.
//!
//! Every mutating hub operation enters the guard first. The guard stays
//! engaged while adapters run, so a nested entry from inside an adapter
//! call is rejected with [`HubError::ReentrantCall`]. Clones share the flag.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use hubledger_types::{HubError, Result};

#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    entered: Arc<AtomicBool>,
}

impl ReentrancyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage the guard. It is released when the returned token drops.
    pub fn enter(&self) -> Result<GuardToken> {
        if self
            .entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HubError::ReentrantCall);
        }
        Ok(GuardToken {
            entered: Arc::clone(&self.entered),
        })
    }

    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

/// Holds the guard engaged until dropped.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the token drops"]
pub struct GuardToken {
    entered: Arc<AtomicBool>,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.entered.store(false, Ordering::Release);
    }
}
