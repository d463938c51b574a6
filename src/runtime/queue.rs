//! # Work Queue
//!
//! A deduplicating work queue with per-key retry backoff.
//!
//! Any number of producers may add keys; a single worker takes them with
//! [`WorkQueue::get`] and hands them back with [`WorkQueue::done`].
//!
//! - A key is queued at most once. Adding a key that is already waiting is a no-op.
//! - A key added while it is being processed is not handed out again until
//!   `done` is called, at which point it is queued exactly once.
//! - After [`WorkQueue::shut_down`], `get` drains nothing further and returns `None`.

use crate::controller::backoff::ItemBackoff;
use crate::observability::metrics;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug)]
struct State<K> {
    queue: VecDeque<K>,
    /// Keys that need processing, whether queued or not
    dirty: HashSet<K>,
    /// Keys currently handed out to the worker
    processing: HashSet<K>,
    shutting_down: bool,
}

#[derive(Debug)]
struct Inner<K> {
    state: Mutex<State<K>>,
    backoff: Mutex<ItemBackoff<K>>,
    /// Wakes `get` when a key is queued or the queue shuts down
    notify: Notify,
    /// Wakes `closed` on shutdown only
    shutdown: Notify,
}

/// Cloneable handle to a shared work queue
#[derive(Debug)]
pub struct WorkQueue<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K> WorkQueue<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new(retry_base: Duration, retry_max: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                backoff: Mutex::new(ItemBackoff::new(retry_base, retry_max)),
                notify: Notify::new(),
                shutdown: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<K>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn backoff(&self) -> MutexGuard<'_, ItemBackoff<K>> {
        self.inner
            .backoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `key` unless it is already waiting
    pub fn add(&self, key: K) {
        let mut state = self.state();
        if state.shutting_down || !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            // Re-queued by done()
            return;
        }
        state.queue.push_back(key);
        metrics::set_queue_depth(state.queue.len());
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Queue `key` once `delay` has elapsed
    pub fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        if self.is_shutting_down() {
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Queue `key` after its next backoff delay
    pub fn add_rate_limited(&self, key: K) {
        let delay = self.backoff().next_delay(&key);
        self.add_after(key, delay);
    }

    /// Clear the retry history of `key`
    pub fn forget(&self, key: &K) {
        self.backoff().forget(key);
    }

    /// Consecutive rate-limited requeues of `key` since it was last forgotten
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.backoff().num_requeues(key)
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so an add between the check and the await is not lost
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    metrics::set_queue_depth(state.queue.len());
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Mark `key` as no longer being processed
    pub fn done(&self, key: &K) {
        let mut state = self.state();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            metrics::set_queue_depth(state.queue.len());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Number of keys waiting to be handed out
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting keys and wake every waiting `get`
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.inner.notify.notify_waiters();
        self.inner.shutdown.notify_waiters();
    }

    /// Resolves once the queue has been shut down
    pub async fn closed(&self) {
        loop {
            let notified = self.inner.shutdown.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_shutting_down() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }
}
