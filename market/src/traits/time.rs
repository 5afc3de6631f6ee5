//! Clock abstraction used to stamp listing documents.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current Unix timestamp.
///
/// The reference store and the listing builder stamp `created_at` /
/// `updated_at` through this, so tests can pin the clock.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now_unix(&self) -> u64;
}

impl<T: TimeProvider + ?Sized> TimeProvider for Arc<T> {
    fn now_unix(&self) -> u64 {
        (**self).now_unix()
    }
}

/// Production implementation that uses the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl SystemTimeProvider {
    pub const fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
