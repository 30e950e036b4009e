//! Cancellable delayed execution.
//!
//! The watchdog never talks to a timer directly. It asks a [`TimeoutScheduler`]
//! to run a callback after a delay and keeps the returned [`CancelHandle`].
//! The default implementation rides on the tokio timer; [`ManualScheduler`]
//! is a virtual clock that only moves when told to.

mod manual;
mod runtime;

use std::fmt;
use std::time::Duration;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

/// Work handed to a scheduler. Runs at most once.
pub type TimeoutCallback = Box<dyn FnOnce() + Send + 'static>;

/// Capability to run a callback once after a delay.
///
/// Implementations must honour the cancellation contract: a callback that
/// has not started when [`CancelHandle::cancel`] returns never runs.
/// Cancelling after the callback has started or finished is a no-op. The
/// callback must never be invoked from inside `schedule` itself.
pub trait TimeoutScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, callback: TimeoutCallback) -> CancelHandle;
}

/// Handle to a single scheduled callback.
///
/// Dropping the handle leaves the callback scheduled; cancellation is always
/// an explicit call.
pub struct CancelHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl CancelHandle {
    /// Wrap the scheduler-specific cancellation action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle whose cancellation does nothing.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Prevent the callback from running if it has not started yet.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}
