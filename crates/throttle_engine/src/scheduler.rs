//! Delayed-task scheduler backed by the Tokio timer wheel.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::error::EngineError;

/// Cancellable handle to a scheduled task
///
/// Cancelling after the task started running has no effect; callers pair
/// each handle with a token that the task re-checks under their own lock.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    /// Cancel the task if it has not fired yet
    pub fn cancel(self) {
        self.abort.abort();
    }

    /// Whether the task ran to completion or was cancelled
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Schedules one-shot callbacks after a delay
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Bind to the runtime of the calling context
    ///
    /// # Errors
    /// Returns [`EngineError::NoRuntime`] outside a Tokio runtime
    pub fn current() -> Result<Self, EngineError> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| EngineError::NoRuntime {
                message: e.to_string(),
            })
    }

    /// Bind to an explicit runtime handle
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Run `task` once after `delay`
    pub fn schedule<F>(&self, delay: Duration, task: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        TimerHandle {
            abort: join.abort_handle(),
        }
    }
}
