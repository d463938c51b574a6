//! # Error Policy
//!
//! What happens after a failed sync pass and after a watch stream error.
//!
//! Failed passes always go back on the queue through the per-key backoff.
//! Watch streams restart on their own (`default_backoff`), so stream errors
//! are only classified and logged here.

use super::coalescer::ResourceKind;
use super::queue::WorkQueue;
use crate::controller::reconciler::ReconcilerError;
use crate::observability::metrics;
use kube::runtime::watcher;
use tracing::{error, warn};

/// Requeue `key` with backoff and record the failure
pub fn handle_sync_error(queue: &WorkQueue<String>, key: &String, error: &ReconcilerError) {
    metrics::increment_sync_errors();
    queue.add_rate_limited(key.clone());
    let retries = queue.num_requeues(key);

    if error.is_validation() {
        // Will not clear until the offending resource is edited
        warn!(
            queue.key = %key,
            retries,
            error = %error,
            "Sync failed on invalid cluster configuration"
        );
    } else {
        error!(
            queue.key = %key,
            retries,
            error = %error,
            "Sync failed, retrying with backoff"
        );
    }
}

/// Broad class of a watch stream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 401/403: RBAC revoked or token expired
    Unauthorized,
    /// 410: resource version too old, the watcher relists
    Expired,
    /// 429: API server throttling or storage reinitializing
    Throttled,
    /// 404: kind not served, usually a missing CRD
    NotFound,
    Other,
}

/// Classify by rendered message so every `watcher::Error` variant is covered
pub fn classify_watch_error(message: &str) -> WatchErrorClass {
    // 404 first: a plain-text 404 body surfaces wrapped in other failures
    if message.contains("404") || message.contains("NotFound") || message.contains("not found") {
        WatchErrorClass::NotFound
    } else if message.contains("401")
        || message.contains("403")
        || message.contains("Unauthorized")
        || message.contains("Forbidden")
    {
        WatchErrorClass::Unauthorized
    } else if message.contains("410")
        || message.contains("too old resource version")
        || message.contains("Expired")
        || message.contains("Gone")
    {
        WatchErrorClass::Expired
    } else if message.contains("429")
        || message.contains("TooManyRequests")
        || message.contains("storage is (re)initializing")
    {
        WatchErrorClass::Throttled
    } else {
        WatchErrorClass::Other
    }
}

pub fn handle_watch_stream_error(kind: ResourceKind, error: &watcher::Error) {
    let message = error.to_string();
    match classify_watch_error(&message) {
        WatchErrorClass::Unauthorized => error!(
            kind = kind.as_str(),
            error = %message,
            "Watch not authorized, check the operator's ClusterRole and ServiceAccount"
        ),
        WatchErrorClass::Expired => warn!(
            kind = kind.as_str(),
            "Watch resource version expired, relisting"
        ),
        WatchErrorClass::Throttled => warn!(
            kind = kind.as_str(),
            error = %message,
            "API server throttling watch, backing off"
        ),
        WatchErrorClass::NotFound => warn!(
            kind = kind.as_str(),
            error = %message,
            "Watched kind not found, is its CRD installed?"
        ),
        WatchErrorClass::Other => error!(
            kind = kind.as_str(),
            error = %message,
            "Watch stream error"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_watch_error() {
        assert_eq!(
            classify_watch_error("ApiError: Unauthorized (ErrorResponse { code: 401 })"),
            WatchErrorClass::Unauthorized
        );
        assert_eq!(
            classify_watch_error("too old resource version: 123 (456)"),
            WatchErrorClass::Expired
        );
        assert_eq!(
            classify_watch_error("storage is (re)initializing"),
            WatchErrorClass::Throttled
        );
        assert_eq!(
            classify_watch_error("failed to perform initial object list: invalid type: integer `404`"),
            WatchErrorClass::NotFound
        );
        assert_eq!(classify_watch_error("connection reset"), WatchErrorClass::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_error_requeues_with_backoff() {
        let queue = WorkQueue::new(
            std::time::Duration::from_millis(5),
            std::time::Duration::from_secs(1000),
        );
        let key = "key".to_string();
        let error = ReconcilerError::Merge(crate::controller::document::MergeError::EmptyPath);

        handle_sync_error(&queue, &key, &error);
        assert_eq!(queue.num_requeues(&key), 1);
        assert!(queue.is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(queue.len(), 1);
    }
}
