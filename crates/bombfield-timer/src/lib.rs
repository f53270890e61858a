//! Cancellable one-shot timers for Bombfield sessions.
//!
//! A session actor never sleeps itself. Instead it asks a
//! [`TimerRegistry`] to deliver a key back to it after a delay, on a
//! channel it polls next to its command channel. Each wakeup is handled
//! between two commands, so a fuse expiring and a player moving can never
//! interleave halfway through a mutation.
//!
//! ```ignore
//! let (timer_tx, mut timer_rx) = mpsc::channel(64);
//! let mut timers = TimerRegistry::new(timer_tx);
//!
//! timers.schedule(TimerKey::Fuse(bomb), config.fuse, TimerKey::Fuse(bomb));
//!
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* ... */ }
//!         Some(key) = timer_rx.recv() => {
//!             if !timers.complete(&key) {
//!                 continue; // cancelled after it was already queued
//!             }
//!             // ...
//!         }
//!     }
//! }
//! ```
//!
//! Keys are owned by the caller. Every key is pending until the owner
//! calls [`complete`](TimerRegistry::complete) or cancels it; dropping the
//! registry cancels everything that has not fired yet.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// A scheduled delivery that has not been completed or cancelled.
struct Pending {
    handle: JoinHandle<()>,
    deadline: Instant,
}

/// Owns a set of keyed, cancellable timers that all deliver into one
/// channel.
pub struct TimerRegistry<K, M> {
    sender: mpsc::Sender<M>,
    pending: HashMap<K, Pending>,
    scheduled_total: u64,
}

impl<K, M> TimerRegistry<K, M>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    M: Send + 'static,
{
    /// Creates a registry that delivers fired messages into `sender`.
    pub fn new(sender: mpsc::Sender<M>) -> Self {
        Self {
            sender,
            pending: HashMap::new(),
            scheduled_total: 0,
        }
    }

    /// Delivers `message` into the channel once `delay` has elapsed.
    ///
    /// Scheduling a key that is already pending replaces the old timer.
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&mut self, key: K, delay: Duration, message: M) {
        let sender = self.sender.clone();
        let task_key = key.clone();
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            time::sleep_until(deadline).await;
            if sender.send(message).await.is_err() {
                trace!(key = ?task_key, "timer fired after its receiver closed");
            }
        });

        if let Some(old) = self.pending.insert(key.clone(), Pending { handle, deadline }) {
            old.handle.abort();
            debug!(?key, "timer rescheduled");
        }
        self.scheduled_total += 1;
        trace!(?key, delay_ms = delay.as_millis() as u64, "timer scheduled");
    }

    /// Marks a delivered timer as handled.
    ///
    /// Returns `false` when the key is not pending, meaning it was
    /// cancelled after its message had already been queued. Callers should
    /// treat that message as stale.
    pub fn complete(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Cancels a pending timer. Returns `true` if one was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some(p) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancels every pending timer and returns how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, p) in self.pending.drain() {
            p.handle.abort();
        }
        if count > 0 {
            debug!(count, "pending timers cancelled");
        }
        count
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Time left before `key` fires. `Some(ZERO)` once the deadline has
    /// passed but the owner has not completed it yet.
    pub fn remaining(&self, key: &K) -> Option<Duration> {
        self.pending
            .get(key)
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of timers ever scheduled on this registry.
    pub fn scheduled_total(&self) -> u64 {
        self.scheduled_total
    }
}

impl<K, M> Drop for TimerRegistry<K, M> {
    fn drop(&mut self) {
        for (_, p) in self.pending.drain() {
            p.handle.abort();
        }
    }
}
