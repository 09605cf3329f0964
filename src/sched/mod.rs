// src/sched/mod.rs

//! Scheduler: executes named graph nodes with series/parallel semantics.
//!
//! - [`context`] carries the cancellation token and changed paths into stages.
//! - [`outcome`] is the value-level result of a run; stage failures never
//!   cross the scheduler boundary as `Err`.
//! - [`scheduler`] walks the graph: series children in declared order with
//!   stop-on-first-error, parallel children concurrently with full
//!   failure aggregation.

pub mod context;
pub mod outcome;
pub mod scheduler;

pub use context::RunContext;
pub use outcome::{RunFailure, RunOutcome};
pub use scheduler::Scheduler;
