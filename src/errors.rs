// src/errors.rs

//! Typed errors for graph construction and watch setup.
//!
//! Everything in here is a construction-time error: it is reported before any
//! task executes and aborts startup. Stage failures at run time are not
//! errors in this sense; the scheduler recovers them into
//! [`RunOutcome`](crate::sched::RunOutcome) values.

use thiserror::Error;

pub use anyhow::{Error, Result};

/// Errors raised while registering or validating the task graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate node name '{0}'")]
    DuplicateName(String),

    #[error("node '{node}' references unknown node '{child}'")]
    UnknownReference { node: String, child: String },

    #[error("cycle in composite references: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("no node named '{0}'")]
    NotFound(String),
}

/// Errors raised while compiling watch rules or arming the watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid glob pattern in watch rule '{rule}'")]
    Pattern {
        rule: String,
        #[source]
        source: globset::Error,
    },

    #[error("watch rule '{rule}' has an empty event filter")]
    EmptyEvents { rule: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error("failed to bind reload listener")]
    Bind(#[source] std::io::Error),
}
