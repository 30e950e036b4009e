//! Default scheduler backed by the tokio timer.

use std::time::Duration;
use tokio::runtime::Handle;
use tracing::trace;

use super::{CancelHandle, TimeoutCallback, TimeoutScheduler};
use crate::error::{ConfigError, Result};

/// Runs each callback on its own task after `tokio::time::sleep`.
///
/// Cancelling aborts the task. Because the callback itself is synchronous,
/// an abort that arrives once the sleep has completed cannot interrupt it.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto an explicit runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| ConfigError::NoRuntime)
    }
}

impl TimeoutScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: TimeoutCallback) -> CancelHandle {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        trace!("Scheduled timeout in {:?}", delay);

        let abort = task.abort_handle();
        CancelHandle::new(move || abort.abort())
    }
}
