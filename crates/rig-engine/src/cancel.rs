//! Cooperative cancellation by generation counter
//!
//! A run captures the current generation when it starts. Any later bump of
//! the counter marks that run as cancelled; the run notices the next time it
//! polls its token. Bumping never blocks and never needs a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, monotonically increasing cancellation counter
#[derive(Debug, Clone, Default)]
pub struct CancelGeneration {
    counter: Arc<AtomicU64>,
}

impl CancelGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current generation for a new run
    pub fn token(&self) -> CancelToken {
        CancelToken {
            counter: self.counter.clone(),
            captured: self.counter.load(Ordering::Acquire),
        }
    }

    /// Cancel every token captured before this call
    pub fn cancel(&self) {
        self.counter.fetch_add(1, Ordering::AcqRel);
    }

    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }
}

/// A run's view of the generation counter
#[derive(Debug, Clone)]
pub struct CancelToken {
    counter: Arc<AtomicU64>,
    captured: u64,
}

impl CancelToken {
    /// A token nothing can cancel
    pub fn never() -> Self {
        CancelGeneration::new().token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.counter.load(Ordering::Acquire) != self.captured
    }
}
