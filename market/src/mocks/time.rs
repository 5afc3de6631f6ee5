//! Pinned clock for testing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::traits::TimeProvider;

/// 2024-01-01 00:00:00 UTC
const DEFAULT_EPOCH: u64 = 1_704_067_200;

/// Clock whose value only moves when a test moves it.
///
/// Clones share the same clock. With [`MockTime::ticking`] every read also
/// advances it, so successive store writes get distinct `updated_at` stamps.
#[derive(Debug, Clone)]
pub struct MockTime {
    now: Arc<AtomicU64>,
    step: u64,
}

impl MockTime {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
            step: 0,
        }
    }

    /// A clock that advances by `step` seconds after every read.
    pub fn ticking(start: u64, step: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
            step,
        }
    }

    pub fn set(&self, timestamp: u64) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Current value without ticking.
    pub fn peek(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl Default for MockTime {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCH)
    }
}

impl TimeProvider for MockTime {
    fn now_unix(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}
