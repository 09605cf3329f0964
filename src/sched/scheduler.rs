// src/sched/scheduler.rs

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span};

use crate::graph::{NodeKind, TaskGraph};
use crate::sched::{RunContext, RunFailure, RunOutcome};
use crate::stage::{BoxFuture, Stage};

/// Executes nodes of a validated [`TaskGraph`].
///
/// Cloning is cheap; all clones share the same immutable graph. The
/// scheduler imposes no mutual exclusion between overlapping runs of the
/// same node; callers that need serialization (the watch sessions do, per
/// rule) provide it themselves.
#[derive(Clone)]
pub struct Scheduler {
    graph: Arc<TaskGraph>,
}

impl Scheduler {
    pub fn new(graph: TaskGraph) -> Self {
        Self {
            graph: Arc::new(graph),
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Run the named node to completion.
    ///
    /// Stage failures never propagate as `Err`; they are folded into the
    /// returned [`RunOutcome`] at the nearest series/parallel boundary.
    pub async fn run(&self, name: &str, ctx: RunContext) -> RunOutcome {
        self.clone().run_node(name.to_string(), ctx).await
    }

    // Recursion through composites goes via a boxed future; `self` is an
    // owned clone so parallel children can be spawned as 'static tasks.
    fn run_node(self, name: String, ctx: RunContext) -> BoxFuture<RunOutcome> {
        Box::pin(async move {
            if ctx.cancel.is_cancelled() {
                debug!(node = %name, "cancelled before start");
                return RunOutcome::Cancelled;
            }

            let kind = match self.graph.resolve(&name) {
                Ok(node) => node.kind().clone(),
                Err(err) => return RunOutcome::Failed(RunFailure::stage(name, err.into())),
            };

            match kind {
                NodeKind::Task(stage) => self.run_task(&name, stage, ctx).await,
                NodeKind::Series(children) => self.run_series(&name, children, ctx).await,
                NodeKind::Parallel(children) => self.run_parallel(&name, children, ctx).await,
            }
        })
    }

    async fn run_task(&self, name: &str, stage: Arc<dyn Stage>, ctx: RunContext) -> RunOutcome {
        let span = info_span!("task", name = %name);
        async move {
            debug!("starting");
            match stage.run(ctx).await {
                Ok(()) => {
                    info!("completed");
                    RunOutcome::Success
                }
                Err(cause) => {
                    error!(cause = %format!("{cause:#}"), "failed");
                    RunOutcome::Failed(RunFailure::stage(name, cause))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_series(&self, name: &str, children: Vec<String>, ctx: RunContext) -> RunOutcome {
        for child in children {
            if ctx.cancel.is_cancelled() {
                debug!(node = %name, next = %child, "series cancelled");
                return RunOutcome::Cancelled;
            }
            match self.clone().run_node(child, ctx.clone()).await {
                RunOutcome::Success => {}
                RunOutcome::Cancelled => return RunOutcome::Cancelled,
                // First failure short-circuits the remaining children: later
                // stages depend on this one's output.
                failed @ RunOutcome::Failed(_) => return failed,
            }
        }
        RunOutcome::Success
    }

    async fn run_parallel(&self, name: &str, children: Vec<String>, ctx: RunContext) -> RunOutcome {
        let count = children.len();
        let mut set = JoinSet::new();
        for (idx, child) in children.into_iter().enumerate() {
            let sched = self.clone();
            let ctx = ctx.clone();
            set.spawn(async move { (idx, sched.run_node(child, ctx).await) });
        }

        // Wait for every child regardless of individual failures, then
        // aggregate in declared order so reports are deterministic.
        let mut slots: Vec<Option<RunOutcome>> = (0..count).map(|_| None).collect();
        let mut join_failures = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(err) => join_failures.push(RunFailure::stage(name, anyhow::anyhow!(err))),
            }
        }

        let mut failures = Vec::new();
        let mut cancelled = false;
        for slot in slots {
            match slot {
                Some(RunOutcome::Failed(failure)) => failures.push(failure),
                Some(RunOutcome::Cancelled) => cancelled = true,
                Some(RunOutcome::Success) | None => {}
            }
        }
        failures.extend(join_failures);

        if !failures.is_empty() {
            RunOutcome::Failed(RunFailure::Aggregate {
                node: name.to_string(),
                failures,
            })
        } else if cancelled {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Success
        }
    }
}
