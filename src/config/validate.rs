// src/config/validate.rs

//! Semantic validation of a loaded configuration.
//!
//! Builds the task graph and compiles every watch rule once, discarding the
//! results, so that a broken config aborts startup before any execution or
//! watch is armed.

use anyhow::{Context, Result, anyhow};

use crate::config::model::ConfigFile;
use crate::graph::TaskGraph;
use crate::watch::patterns::compile_rules;

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one task
/// - task/series/parallel names are unique (one namespace)
/// - all composite steps refer to existing nodes
/// - the composite reference graph has no cycles
/// - every watch rule names an existing target, has a valid glob and a
///   non-empty event filter
/// - `settings.default_target`, when set, names an existing node
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;

    let graph = TaskGraph::from_config(cfg).context("invalid task graph")?;
    compile_rules(cfg, &graph).context("invalid watch rules")?;

    if let Some(target) = &cfg.settings.default_target {
        graph
            .resolve(target)
            .with_context(|| format!("settings.default_target = '{target}'"))?;
    }

    Ok(())
}

fn ensure_has_tasks(cfg: &ConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(anyhow!(
            "config must contain at least one [task.<name>] section"
        ));
    }
    Ok(())
}
