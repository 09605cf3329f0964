// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::WatchError;
use crate::reload::ReloadBus;
use crate::sched::Scheduler;
use crate::watch::patterns::{ChangeKind, CompiledRule};
use crate::watch::session::{self, SessionHandle, SessionNotifier};

/// Running watcher: the notify handle plus one session per rule.
///
/// Keeping the `RecommendedWatcher` alive keeps filesystem monitoring
/// active; [`Watcher::stop`] tears everything down in order.
pub struct Watcher {
    sessions: Vec<SessionHandle>,
    dispatch: JoinHandle<()>,
    cancel: CancellationToken,
    fs: RecommendedWatcher,
}

impl Watcher {
    /// Arm filesystem monitoring for `rules` under `root`.
    ///
    /// Each rule gets its own session; different rules run concurrently
    /// while one rule's runs stay serialized.
    pub fn spawn(
        root: impl Into<PathBuf>,
        rules: Vec<CompiledRule>,
        scheduler: Scheduler,
        bus: Arc<ReloadBus>,
    ) -> Result<Self, WatchError> {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);

        let cancel = CancellationToken::new();

        let mut sessions = Vec::with_capacity(rules.len());
        let mut routes: Vec<(Arc<CompiledRule>, SessionNotifier)> = Vec::with_capacity(rules.len());
        for rule in rules {
            let rule = Arc::new(rule);
            let handle = session::spawn(
                Arc::clone(&rule),
                scheduler.clone(),
                Arc::clone(&bus),
                cancel.clone(),
            );
            routes.push((rule, handle.notifier()));
            sessions.push(handle);
        }

        // Channel from the blocking notify callback into the async world.
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let mut fs = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                // Scoped to a single event; keep monitoring.
                Err(err) => eprintln!("pipewatch: file watch error: {err}"),
            },
            Config::default(),
        )?;
        fs.watch(&root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), rules = routes.len(), "file watcher started");

        let dispatch = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let Some(kind) = change_kind(&event.kind) else {
                    continue;
                };
                for path in &event.paths {
                    let Some(rel) = relative_str(&root, path) else {
                        debug!(path = %path.display(), "event outside watch root");
                        continue;
                    };
                    for (rule, notifier) in &routes {
                        if rule.matches(kind, &rel) {
                            debug!(rule = %rule.name(), path = %rel, ?kind, "watch match");
                            notifier.notify(&rel);
                        }
                    }
                }
            }
            debug!("watch dispatch loop ended");
        });

        Ok(Self {
            sessions,
            dispatch,
            cancel,
            fs,
        })
    }

    /// Cancel pending settle timers and in-flight runs' tokens, then release
    /// filesystem monitoring resources.
    ///
    /// In-flight stages run to natural completion; their outcomes are still
    /// logged before this returns.
    pub async fn stop(self) {
        let Watcher {
            sessions,
            dispatch,
            cancel,
            fs,
        } = self;

        cancel.cancel();
        // Dropping the notify handle drops the callback and with it the
        // event sender, which ends the dispatch loop.
        drop(fs);
        let _ = dispatch.await;
        for session in sessions {
            session.join().await;
        }
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Changed),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => None,
    }
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root`.
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
