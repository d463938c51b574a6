//! # Worker
//!
//! The single consumer of the work queue. Each key it takes waits for a
//! token from the global rate limiter, then runs one sync pass.
//!
//! Only one worker runs, so sync passes never overlap.

use super::error_policy::handle_sync_error;
use super::queue::WorkQueue;
use super::rate_limiter::TokenBucket;
use crate::controller::reconciler::Reconciler;
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Process keys until the queue shuts down
pub async fn run_worker(
    queue: WorkQueue<String>,
    limiter: Arc<TokenBucket>,
    reconciler: Arc<Reconciler>,
) {
    info!("Worker started");
    while process_next_work_item(&queue, &limiter, &reconciler).await {}
    info!("Worker stopped");
}

/// Take one key and sync it. Returns `false` once the queue is shut down.
pub async fn process_next_work_item(
    queue: &WorkQueue<String>,
    limiter: &TokenBucket,
    reconciler: &Reconciler,
) -> bool {
    let Some(key) = queue.get().await else {
        return false;
    };

    let waited = tokio::select! {
        waited = limiter.acquire() => waited,
        () = queue.closed() => {
            queue.done(&key);
            return false;
        }
    };
    metrics::observe_rate_limiter_wait(waited.as_secs_f64());
    if !waited.is_zero() {
        debug!(queue.key = %key, waited_ms = waited.as_millis(), "Sync rate limited");
    }

    metrics::increment_syncs();
    let start = Instant::now();
    let result = reconciler.sync(&key).await;
    metrics::observe_sync_duration(start.elapsed().as_secs_f64());

    match result {
        Ok(outcome) if outcome.requeue => {
            debug!(queue.key = %key, "Operand not yet available, requeueing");
            queue.add_rate_limited(key.clone());
        }
        Ok(_) => queue.forget(&key),
        Err(e) => handle_sync_error(queue, &key, &e),
    }
    queue.done(&key);
    true
}
