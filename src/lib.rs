// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod reload;
pub mod sched;
pub mod serve;
pub mod stage;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, ReloadSetting};
use crate::graph::TaskGraph;
use crate::reload::ReloadBus;
use crate::sched::{RunContext, RunOutcome, Scheduler};
use crate::watch::Watcher;
use crate::watch::patterns::compile_rules;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + validation
/// - graph construction
/// - one-shot runs (`run <name>`)
/// - watch mode (watcher + reload bus + static server + Ctrl-C handling)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let graph = TaskGraph::from_config(&cfg)?;

    match args.command {
        Command::Run { name } => run_once(&cfg, graph, name).await,
        Command::Watch => run_watch(&cfg, graph, &config_path).await,
    }
}

/// One-shot invocation: run the node and map the outcome to the exit status.
async fn run_once(cfg: &ConfigFile, graph: TaskGraph, name: Option<String>) -> Result<()> {
    let target = match name.or_else(|| cfg.settings.default_target.clone()) {
        Some(target) => target,
        None => bail!("no node name given and no `settings.default_target` configured"),
    };

    let scheduler = Scheduler::new(graph);
    match scheduler.run(&target, RunContext::new()).await {
        RunOutcome::Success => {
            info!(node = %target, "run succeeded");
            Ok(())
        }
        RunOutcome::Cancelled => bail!("run of '{target}' was cancelled"),
        RunOutcome::Failed(failure) => {
            Err(anyhow!(failure).context(format!("run of '{target}' failed")))
        }
    }
}

/// Watch mode: arm the reload bus, the optional static server and the
/// watcher, then block until Ctrl-C.
async fn run_watch(cfg: &ConfigFile, graph: TaskGraph, config_path: &Path) -> Result<()> {
    let scheduler = Scheduler::new(graph);
    let rules = compile_rules(cfg, scheduler.graph())?;
    if rules.is_empty() {
        bail!("watch mode needs at least one [watch.<name>] rule");
    }

    let bus = Arc::new(ReloadBus::new());
    let reload_port = reload::ws::spawn_listener(Arc::clone(&bus), cfg.settings.reload_port)?;
    debug!(reload_port, "reload bus ready");

    let _server = cfg.serve.as_ref().map(serve::spawn);

    let root = watch_root(config_path);
    let watcher = Watcher::spawn(root, rules, scheduler, bus)?;

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;
    info!("shutdown requested; stopping watcher");
    watcher.stop().await;

    Ok(())
}

/// Watch root: the directory containing the config file, or `.`.
fn watch_root(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Simple dry-run output: print nodes and watch rules.
fn print_dry_run(cfg: &ConfigFile) {
    println!("pipewatch dry-run");
    println!();

    let nodes = cfg.task.len() + cfg.series.len() + cfg.parallel.len();
    println!("nodes ({nodes}):");
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
    }
    for (name, group) in cfg.series.iter() {
        println!("  - {name}");
        println!("      series: {:?}", group.steps);
    }
    for (name, group) in cfg.parallel.iter() {
        println!("  - {name}");
        println!("      parallel: {:?}", group.steps);
    }

    println!();
    println!("watch rules ({}):", cfg.watch.len());
    for (name, rule) in cfg.watch.iter() {
        println!("  - {name}: {} -> {}", rule.pattern, rule.target);
        if !rule.exclude.is_empty() {
            println!("      exclude: {:?}", rule.exclude);
        }
        if let Some(ms) = rule.settle_delay_ms {
            println!("      settle_delay_ms: {ms}");
        }
        if rule.reload != ReloadSetting::None {
            println!("      reload: {:?}", rule.reload);
        }
    }

    debug!("dry-run complete (no execution)");
}
