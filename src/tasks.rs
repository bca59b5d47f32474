use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{error, Instrument};

/// Fire-and-forget executor for work that must not fail the request that
/// submitted it. Errors and panics are logged and dropped.
#[derive(Clone, Default)]
pub struct BackgroundTasks;

impl BackgroundTasks {
    pub fn new() -> Self {
        Self
    }

    /// Runs `task` detached. The returned handle resolves once the task and its
    /// error reporting have finished; callers are free to drop it.
    pub fn spawn<F>(&self, name: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let span = tracing::info_span!("background_task", task = name);
        let worker = tokio::spawn(task.instrument(span));
        tokio::spawn(async move {
            match worker.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(task = name, error = ?e, "background task failed"),
                Err(e) if e.is_panic() => error!(task = name, "background task panicked"),
                Err(e) => error!(task = name, error = %e, "background task aborted"),
            }
        })
    }
}
