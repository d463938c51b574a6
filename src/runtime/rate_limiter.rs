//! # Token Bucket
//!
//! Global rate limiter gating how often a sync pass may start.
//!
//! The bucket holds up to `burst` tokens and refills at `qps` tokens per second.
//! It starts full, so the first `burst` passes run back to back. After that a
//! flapping resource can trigger at most `qps` passes per second.
//!
//! Time comes from `tokio::time`, so tests can pause and advance the clock.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Slowest refill a bucket accepts, one token every ~17 minutes
pub const MIN_QPS: f64 = 0.001;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    qps: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// A `qps` below [`MIN_QPS`] (including zero, negative and NaN) is raised
    /// to it. A zero burst is treated as one.
    pub fn new(qps: f64, burst: u32) -> Self {
        let qps = if qps.is_nan() { MIN_QPS } else { qps.clamp(MIN_QPS, f64::MAX) };
        let burst = f64::from(burst.max(1));
        Self {
            qps,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.qps).min(self.burst);
        state.last_refill = now;
    }

    /// Take a token if one is available right now
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Reserve the next token and return how long until it may be used
    ///
    /// The token is taken immediately, so concurrent callers queue up behind
    /// each other instead of racing for the same refill.
    pub fn reserve(&self) -> Duration {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, Instant::now());
        state.tokens -= 1.0;
        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.qps)
        }
    }

    /// Wait until a token is available and take it. Returns how long it waited.
    pub async fn acquire(&self) -> Duration {
        let wait = self.reserve();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(0.05, 4);
        for _ in 0..4 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_at_configured_rate() {
        let bucket = TokenBucket::new(0.5, 4);
        for _ in 0..4 {
            assert!(bucket.try_acquire());
        }
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!bucket.try_acquire());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_next_token() {
        let bucket = TokenBucket::new(0.5, 1);
        assert_eq!(bucket.acquire().await, Duration::ZERO);

        let start = Instant::now();
        let waited = bucket.acquire().await;
        assert_eq!(waited, Duration::from_secs(2));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_qps_is_clamped() {
        for qps in [0.0, -3.0, f64::NAN] {
            let bucket = TokenBucket::new(qps, 1);
            assert!(bucket.try_acquire());
            let waited = bucket.reserve();
            assert_eq!(waited, Duration::from_secs_f64(1.0 / MIN_QPS), "qps {qps}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_never_exceeds_burst() {
        let bucket = TokenBucket::new(1.0, 2);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }
}
