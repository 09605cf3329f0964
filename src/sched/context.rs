// src/sched/context.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Execution context handed to every stage invocation.
///
/// Cheap to clone; all clones observe the same cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Cooperative cancellation signal. The scheduler checks it at
    /// child-start boundaries; a stage already running is never pre-empted.
    pub cancel: CancellationToken,
    /// Paths that triggered this run, relative to the watch root with
    /// forward slashes. Empty for explicit invocations.
    pub changed: Arc<Vec<String>>,
}

impl RunContext {
    /// Context for an explicit (non-watch) invocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a watch-triggered invocation.
    pub fn triggered(cancel: CancellationToken, changed: Vec<String>) -> Self {
        Self {
            cancel,
            changed: Arc::new(changed),
        }
    }
}
