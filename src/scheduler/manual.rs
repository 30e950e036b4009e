//! Virtual-clock scheduler for deterministic tests and custom clocks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::trace;

use super::{CancelHandle, TimeoutCallback, TimeoutScheduler};

/// Callbacks keyed by (deadline, insertion order).
type Queue = BTreeMap<(Duration, u64), TimeoutCallback>;

#[derive(Default)]
struct Clock {
    now: Duration,
    next_seq: u64,
    queue: Queue,
}

/// Scheduler whose time only moves on [`ManualScheduler::advance`].
///
/// Clones share the same clock, so a test can keep one clone and hand the
/// other to the watchdog.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<Clock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since construction.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of callbacks scheduled and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Move the clock forward, firing every callback that falls due.
    ///
    /// Time saturates at `Duration::MAX` instead of overflowing.
    ///
    /// Callbacks run in deadline order with the clock set to their deadline.
    /// The lock is released around each callback, so a callback may schedule
    /// again; if the new deadline is inside the window it fires in this call.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now.saturating_add(by);

        while let Some(callback) = self.pop_due(target) {
            callback();
        }

        let mut clock = self.lock();
        if clock.now < target {
            clock.now = target;
        }
    }

    fn pop_due(&self, target: Duration) -> Option<TimeoutCallback> {
        let mut clock = self.lock();
        let entry = clock.queue.first_entry()?;
        let (deadline, _) = *entry.key();
        if deadline > target {
            return None;
        }
        let (_, callback) = entry.remove_entry();
        clock.now = deadline;
        trace!("Virtual clock firing timeout at {:?}", deadline);
        Some(callback)
    }

    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimeoutScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: TimeoutCallback) -> CancelHandle {
        let key = {
            let mut clock = self.lock();
            let key = (clock.now.saturating_add(delay), clock.next_seq);
            clock.next_seq += 1;
            clock.queue.insert(key, callback);
            key
        };

        let clock = Arc::downgrade(&self.clock);
        CancelHandle::new(move || {
            if let Some(clock) = clock.upgrade() {
                let mut clock = clock.lock().unwrap_or_else(PoisonError::into_inner);
                clock.queue.remove(&key);
            }
        })
    }
}
