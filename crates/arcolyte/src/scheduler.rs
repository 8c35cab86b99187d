//! One-shot delayed tasks on a dedicated runtime.
//!
//! Each scheduled task runs exactly once, no earlier than its delay, on a
//! scheduler-owned thread. Its return value is delivered through a
//! [`oneshot`] receiver; callers that only want the side effect may drop the
//! receiver. There is no cancellation.

use std::sync::OnceLock;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::config::SchedulerConfig;

static GLOBAL: OnceLock<Result<Scheduler, ApiError>> = OnceLock::new();

/// Runs delayed one-shot tasks.
#[derive(Debug)]
pub struct Scheduler {
    runtime: Runtime,
}

impl Scheduler {
    /// Start a scheduler with its own worker threads.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the runtime cannot be started.
    pub fn new(config: &SchedulerConfig) -> Result<Self, ApiError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()
            .map_err(|e| ApiError::callback(format!("Scheduler runtime error: {e}")))?;
        debug!(workers = config.worker_threads, "callback scheduler started");
        Ok(Self { runtime })
    }

    /// The process-wide scheduler used by the C ABI, started on first use.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the runtime could not be started. The failure is
    /// sticky.
    pub fn global() -> Result<&'static Self, ApiError> {
        GLOBAL
            .get_or_init(|| Self::new(&SchedulerConfig::default()))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Run `task` once after `delay`.
    ///
    /// The task runs on a blocking-pool thread of this scheduler, so it may
    /// block without stalling other timers.
    pub fn schedule_after<T, F>(&self, delay: Duration, task: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            match tokio::task::spawn_blocking(task).await {
                Ok(value) => {
                    // Receiver may have been dropped; the task still ran.
                    let _ = tx.send(value);
                }
                Err(e) => warn!(error = %e, "scheduled task failed"),
            }
        });
        rx
    }
}
