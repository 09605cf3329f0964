// src/sched/outcome.rs

use std::sync::Arc;

use thiserror::Error;

/// Terminal result of running a graph node.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Success,
    /// The run observed the cancellation signal before finishing.
    Cancelled,
    Failed(RunFailure),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            RunOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Failure detail, aggregated upward through composites.
///
/// `Arc` around the cause keeps failures cheap to clone when one outcome is
/// reported to several observers.
#[derive(Debug, Clone, Error)]
pub enum RunFailure {
    /// A leaf stage reported an error.
    #[error("task '{task}': {cause:#}")]
    Stage {
        task: String,
        cause: Arc<anyhow::Error>,
    },

    /// A parallel composite with one or more failed children.
    #[error("'{node}': {} child run(s) failed: [{}]", .failures.len(), format_children(.failures))]
    Aggregate {
        node: String,
        failures: Vec<RunFailure>,
    },
}

impl RunFailure {
    pub fn stage(task: impl Into<String>, cause: anyhow::Error) -> Self {
        RunFailure::Stage {
            task: task.into(),
            cause: Arc::new(cause),
        }
    }

    /// Names of every failing leaf task, in declared order.
    pub fn failing_tasks(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_tasks(&mut names);
        names
    }

    fn collect_tasks<'a>(&'a self, into: &mut Vec<&'a str>) {
        match self {
            RunFailure::Stage { task, .. } => into.push(task),
            RunFailure::Aggregate { failures, .. } => {
                for failure in failures {
                    failure.collect_tasks(into);
                }
            }
        }
    }
}

fn format_children(failures: &[RunFailure]) -> String {
    failures
        .iter()
        .map(RunFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
