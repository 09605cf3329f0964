// src/watch/patterns.rs

use std::fmt;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::config::model::{ConfigFile, WatchConfig};
use crate::errors::WatchError;
use crate::graph::TaskGraph;
use crate::reload::ReloadScope;

/// Kind of filesystem change, after mapping from raw notify events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

/// A watch rule compiled into matchable form.
///
/// Patterns are evaluated against paths relative to the watch root, with
/// forward slashes (e.g. `"_dev/assets/sass/main.scss"`).
#[derive(Clone)]
pub struct CompiledRule {
    name: String,
    pattern: GlobSet,
    exclude: Option<GlobSet>,
    events: Vec<ChangeKind>,
    target: String,
    settle_delay: Duration,
    reload: Option<ReloadScope>,
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("name", &self.name)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl CompiledRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node the scheduler runs when this rule settles.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Quiet period after the last matching event before the target runs.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Broadcast scope after a successful run, if any.
    pub fn reload(&self) -> Option<ReloadScope> {
        self.reload
    }

    /// True if the rule fires for this change kind and path.
    pub fn matches(&self, kind: ChangeKind, rel_path: &str) -> bool {
        if !self.events.contains(&kind) {
            return false;
        }
        if !self.pattern.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude
            && exclude.is_match(rel_path)
        {
            return false;
        }
        true
    }
}

/// Compile every `[watch.<name>]` section, resolving targets against the
/// graph.
pub fn compile_rules(cfg: &ConfigFile, graph: &TaskGraph) -> Result<Vec<CompiledRule>, WatchError> {
    let mut rules = Vec::with_capacity(cfg.watch.len());
    for (name, wc) in &cfg.watch {
        rules.push(compile_rule(name, wc, cfg.settings.settle_delay_ms, graph)?);
    }
    Ok(rules)
}

/// Compile a single rule against the graph.
pub fn compile_rule(
    name: &str,
    wc: &WatchConfig,
    default_settle_ms: u64,
    graph: &TaskGraph,
) -> Result<CompiledRule, WatchError> {
    graph.resolve(&wc.target)?;

    if wc.events.is_empty() {
        return Err(WatchError::EmptyEvents { rule: name.into() });
    }

    let pattern = build_globset(std::slice::from_ref(&wc.pattern)).map_err(|source| {
        WatchError::Pattern {
            rule: name.into(),
            source,
        }
    })?;

    let exclude = if wc.exclude.is_empty() {
        None
    } else {
        Some(
            build_globset(&wc.exclude).map_err(|source| WatchError::Pattern {
                rule: name.into(),
                source,
            })?,
        )
    };

    Ok(CompiledRule {
        name: name.into(),
        pattern,
        exclude,
        events: wc.events.clone(),
        target: wc.target.clone(),
        settle_delay: Duration::from_millis(wc.settle_delay_ms.unwrap_or(default_settle_ms)),
        reload: wc.reload.scope(),
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    builder.build()
}
