// src/watch/session.rs

//! Per-rule watch session: settle-timer debounce, path coalescing and run
//! serialization.
//!
//! Editors and compilers emit several filesystem events per logical save, so
//! a session only invokes its target once the rule has been quiet for the
//! settle delay. Runs for one rule never overlap: a settle firing while a
//! run is in flight folds into a single queued follow-up that starts after
//! the in-flight run completes.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::reload::ReloadBus;
use crate::sched::{RunContext, RunOutcome, Scheduler};
use crate::watch::patterns::CompiledRule;

/// Handle to a spawned rule session.
pub struct SessionHandle {
    events_tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Feed a matching changed path into the session.
    pub fn notify(&self, rel_path: &str) {
        // Send only fails once the driver stopped; nothing to do then.
        let _ = self.events_tx.send(rel_path.to_string());
    }

    /// Cloneable sender for the dispatch loop.
    pub fn notifier(&self) -> SessionNotifier {
        SessionNotifier {
            tx: self.events_tx.clone(),
        }
    }

    /// Close the event channel and wait for the driver (and any in-flight
    /// run) to finish.
    pub async fn join(self) {
        drop(self.events_tx);
        let _ = self.task.await;
    }
}

/// Lightweight handle for feeding paths into a session from another task.
#[derive(Clone)]
pub struct SessionNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl SessionNotifier {
    pub fn notify(&self, rel_path: &str) {
        let _ = self.tx.send(rel_path.to_string());
    }
}

/// Spawn the driver task for one watch rule.
pub fn spawn(
    rule: Arc<CompiledRule>,
    scheduler: Scheduler,
    bus: Arc<ReloadBus>,
    cancel: CancellationToken,
) -> SessionHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let driver = Driver {
        rule,
        scheduler,
        bus,
        cancel,
        events_rx,
    };
    let task = tokio::spawn(driver.run());
    SessionHandle { events_tx, task }
}

struct Driver {
    rule: Arc<CompiledRule>,
    scheduler: Scheduler,
    bus: Arc<ReloadBus>,
    cancel: CancellationToken,
    events_rx: mpsc::UnboundedReceiver<String>,
}

impl Driver {
    async fn run(mut self) {
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut deadline: Option<Instant> = None;
        let mut queued: Option<BTreeSet<String>> = None;
        let mut in_flight = false;

        // The local sender keeps `done_rx` open for the whole loop, so the
        // recv arm only ever yields actual outcomes.
        let (done_tx, mut done_rx) = mpsc::channel::<RunOutcome>(1);

        loop {
            // `deadline` is Copy, so the settle future owns its own copy and
            // the select arms below stay free to reassign it.
            let settle = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(path) => {
                        pending.insert(path);
                        // Every event within the window pushes the deadline out.
                        deadline = Some(Instant::now() + self.rule.settle_delay());
                    }
                    // Channel closed: the watcher is shutting down.
                    None => break,
                },
                _ = settle => {
                    deadline = None;
                    let paths = std::mem::take(&mut pending);
                    if in_flight {
                        // Serialize per rule: fold into the single queued
                        // follow-up run.
                        queued.get_or_insert_with(BTreeSet::new).extend(paths);
                    } else {
                        self.start_run(paths, &done_tx);
                        in_flight = true;
                    }
                },
                Some(outcome) = done_rx.recv(), if in_flight => {
                    in_flight = false;
                    self.finish_run(outcome);
                    if let Some(paths) = queued.take() {
                        self.start_run(paths, &done_tx);
                        in_flight = true;
                    }
                },
                _ = self.cancel.cancelled() => break,
            }
        }

        // Drain the in-flight run so its outcome is still reported.
        if in_flight && let Some(outcome) = done_rx.recv().await {
            self.finish_run(outcome);
        }
    }

    fn start_run(&self, paths: BTreeSet<String>, done_tx: &mpsc::Sender<RunOutcome>) {
        let changed: Vec<String> = paths.into_iter().collect();
        info!(
            rule = %self.rule.name(),
            target = %self.rule.target(),
            files = changed.len(),
            "settle elapsed; starting run"
        );

        let scheduler = self.scheduler.clone();
        let target = self.rule.target().to_string();
        let ctx = RunContext::triggered(self.cancel.child_token(), changed);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let outcome = scheduler.run(&target, ctx).await;
            let _ = done_tx.send(outcome).await;
        });
    }

    fn finish_run(&self, outcome: RunOutcome) {
        match outcome {
            RunOutcome::Success => {
                info!(rule = %self.rule.name(), "run succeeded");
                if let Some(scope) = self.rule.reload() {
                    self.bus.broadcast(scope);
                }
            }
            RunOutcome::Cancelled => {
                debug!(rule = %self.rule.name(), "run cancelled");
            }
            RunOutcome::Failed(failure) => {
                // Keep watching; the next change can fix the build.
                error!(rule = %self.rule.name(), %failure, "run failed");
            }
        }
    }
}
