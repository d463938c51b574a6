//! # Per-Key Exponential Backoff
//!
//! Tracks how often each work-queue key has failed and computes the delay before
//! it may be retried.
//!
//! The delay doubles with each consecutive failure, starting at `base` and
//! capped at `max`. A successful sync calls [`ItemBackoff::forget`] and the next
//! failure starts again from `base`.
//!
//! With the defaults (5ms base, 1000s cap) the sequence is
//! 5ms, 10ms, 20ms, 40ms, ... reaching the cap after roughly 28 failures.
//!
//! ## Usage
//!
//! ```rust
//! use controller_manager_operator::controller::backoff::ItemBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ItemBackoff::new(Duration::from_millis(5), Duration::from_secs(1000));
//! assert_eq!(backoff.next_delay(&"key"), Duration::from_millis(5));
//! assert_eq!(backoff.next_delay(&"key"), Duration::from_millis(10));
//! backoff.forget(&"key");
//! assert_eq!(backoff.next_delay(&"key"), Duration::from_millis(5));
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Exponential backoff tracked per key
#[derive(Debug, Clone)]
pub struct ItemBackoff<K> {
    /// Delay after the first failure
    base: Duration,
    /// Upper bound for any delay
    max: Duration,
    /// Consecutive failures per key
    failures: HashMap<K, u32>,
}

impl<K: Eq + Hash + Clone> ItemBackoff<K> {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: HashMap::new(),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying it
    pub fn next_delay(&mut self, key: &K) -> Duration {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        let exponent = *failures;
        *failures = failures.saturating_add(1);

        // 2^31 * any non-zero base is far past any sensible cap
        let factor = 2u32.checked_pow(exponent.min(31)).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Clear the failure history for `key`
    pub fn forget(&mut self, key: &K) {
        self.failures.remove(key);
    }

    /// Number of consecutive failures recorded for `key`
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }
}
