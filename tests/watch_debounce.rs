use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use pipewatch::config::model::{ReloadSetting, WatchConfig};
use pipewatch::graph::GraphBuilder;
use pipewatch::reload::{ReloadBus, ReloadScope, ReloadSink, SinkClosed};
use pipewatch::sched::{RunContext, Scheduler};
use pipewatch::watch::patterns::{ChangeKind, compile_rule};
use pipewatch::watch::{Watcher, session};
use tokio::sync::Notify;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

type TestResult = Result<(), Box<dyn Error>>;

struct RecorderSink(Arc<Mutex<Vec<ReloadScope>>>);

impl ReloadSink for RecorderSink {
    fn send(&mut self, scope: ReloadScope) -> Result<(), SinkClosed> {
        self.0.lock().unwrap().push(scope);
        Ok(())
    }
}

struct Fixture {
    session: session::SessionHandle,
    runs: Arc<Mutex<Vec<Vec<String>>>>,
    scopes: Arc<Mutex<Vec<ReloadScope>>>,
}

/// One rule targeting one stage. The stage records the changed paths of
/// every invocation; with a `gate` it blocks until the test releases it,
/// and with `fail` it reports an error instead of succeeding.
fn fixture(
    settle_ms: u64,
    reload: ReloadSetting,
    gate: Option<Arc<Notify>>,
    fail: bool,
) -> Fixture {
    let runs: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();

    let mut b = GraphBuilder::new();
    let stage_runs = Arc::clone(&runs);
    b.task("compile_styles", move |ctx: RunContext| {
        let runs = Arc::clone(&stage_runs);
        let gate = gate.clone();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            runs.lock().unwrap().push(ctx.changed.as_ref().clone());
            if fail {
                Err(anyhow!("stylesheet compiler crashed"))
            } else {
                Ok(())
            }
        }
    })
    .unwrap();
    let scheduler = Scheduler::new(b.build().unwrap());

    let wc = WatchConfig {
        pattern: "*.src".into(),
        exclude: vec![],
        events: vec![ChangeKind::Created, ChangeKind::Changed],
        target: "compile_styles".into(),
        settle_delay_ms: Some(settle_ms),
        reload,
    };
    let rule = compile_rule("styles", &wc, 300, scheduler.graph()).unwrap();

    let scopes: Arc<Mutex<Vec<ReloadScope>>> = Arc::default();
    let bus = Arc::new(ReloadBus::new());
    bus.connect(Box::new(RecorderSink(Arc::clone(&scopes))));

    let session = session::spawn(Arc::new(rule), scheduler, bus, CancellationToken::new());
    Fixture {
        session,
        runs,
        scopes,
    }
}

#[tokio::test(start_paused = true)]
async fn burst_collapses_into_one_run_with_union_of_paths() -> TestResult {
    let f = fixture(300, ReloadSetting::Style, None, false);

    // Three events at t = 0, 100 and 250 ms.
    f.session.notify("a.src");
    sleep(Duration::from_millis(100)).await;
    f.session.notify("b.src");
    sleep(Duration::from_millis(150)).await;
    f.session.notify("a.src");

    // Still inside the settle window just before 250 + 300 ms.
    sleep(Duration::from_millis(299)).await;
    assert!(f.runs.lock().unwrap().is_empty());

    // The window closes at ~550 ms: exactly one run with the union of paths,
    // followed by one style-scoped broadcast.
    sleep(Duration::from_millis(2)).await;
    let runs = f.runs.lock().unwrap().clone();
    assert_eq!(runs, vec![vec!["a.src".to_string(), "b.src".to_string()]]);
    assert_eq!(*f.scopes.lock().unwrap(), [ReloadScope::Style]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn event_after_settled_run_triggers_an_independent_run() -> TestResult {
    let f = fixture(300, ReloadSetting::None, None, false);

    f.session.notify("a.src");
    sleep(Duration::from_millis(301)).await;
    assert_eq!(f.runs.lock().unwrap().len(), 1);

    f.session.notify("b.src");
    sleep(Duration::from_millis(301)).await;

    let runs = f.runs.lock().unwrap().clone();
    assert_eq!(
        runs,
        vec![vec!["a.src".to_string()], vec!["b.src".to_string()]]
    );
    // reload = none: no broadcast either time.
    assert!(f.scopes.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn settle_during_in_flight_run_queues_exactly_one_follow_up() -> TestResult {
    let gate = Arc::new(Notify::new());
    let f = fixture(100, ReloadSetting::None, Some(Arc::clone(&gate)), false);

    f.session.notify("a.src");
    sleep(Duration::from_millis(101)).await;
    // The first run is now blocked inside the stage.
    assert!(f.runs.lock().unwrap().is_empty());

    // Two settle windows elapse while the run is in flight; both fold into
    // one queued follow-up.
    f.session.notify("b.src");
    sleep(Duration::from_millis(101)).await;
    f.session.notify("c.src");
    sleep(Duration::from_millis(101)).await;
    assert!(f.runs.lock().unwrap().is_empty());

    // Finish the first run; only then does the follow-up start.
    gate.notify_one();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(*f.runs.lock().unwrap(), vec![vec!["a.src".to_string()]]);

    gate.notify_one();
    sleep(Duration::from_millis(1)).await;
    let runs = f.runs.lock().unwrap().clone();
    assert_eq!(
        runs,
        vec![
            vec!["a.src".to_string()],
            vec!["b.src".to_string(), "c.src".to_string()],
        ]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_run_does_not_broadcast() -> TestResult {
    let f = fixture(100, ReloadSetting::Full, None, true);

    f.session.notify("a.src");
    sleep(Duration::from_millis(101)).await;

    assert_eq!(f.runs.lock().unwrap().len(), 1);
    assert!(f.scopes.lock().unwrap().is_empty());

    // The session keeps watching after a failure.
    f.session.notify("b.src");
    sleep(Duration::from_millis(101)).await;
    assert_eq!(f.runs.lock().unwrap().len(), 2);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn filesystem_changes_drive_the_watcher() -> TestResult {
    let dir = tempfile::tempdir()?;

    let runs: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let mut b = GraphBuilder::new();
    let stage_runs = Arc::clone(&runs);
    b.task("copy_html", move |ctx: RunContext| {
        let runs = Arc::clone(&stage_runs);
        async move {
            runs.lock().unwrap().push(ctx.changed.as_ref().clone());
            anyhow::Ok(())
        }
    })?;
    let scheduler = Scheduler::new(b.build()?);

    let wc = WatchConfig {
        pattern: "**/*.html".into(),
        exclude: vec![],
        events: vec![ChangeKind::Created, ChangeKind::Changed],
        target: "copy_html".into(),
        settle_delay_ms: Some(100),
        reload: ReloadSetting::None,
    };
    let rule = compile_rule("markup", &wc, 300, scheduler.graph())?;

    let watcher = Watcher::spawn(dir.path(), vec![rule], scheduler, Arc::new(ReloadBus::new()))?;

    // Give the OS watcher a moment to arm before producing events.
    sleep(Duration::from_millis(200)).await;
    std::fs::write(dir.path().join("index.html"), "<html></html>")?;

    for _ in 0..100 {
        if !runs.lock().unwrap().is_empty() {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    // All events from the single write coalesce into one run.
    sleep(Duration::from_millis(300)).await;
    let seen = runs.lock().unwrap().clone();
    assert_eq!(seen.len(), 1, "expected one coalesced run, got {seen:?}");
    assert_eq!(seen[0], ["index.html"]);

    watcher.stop().await;
    Ok(())
}
