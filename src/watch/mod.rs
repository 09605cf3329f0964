// src/watch/mod.rs

//! File watching: glob rules, per-rule debounce sessions, notify glue.
//!
//! - [`patterns`] compiles `[watch.<name>]` sections into matchable rules.
//! - [`session`] drives one rule: settle-timer debounce, path coalescing and
//!   per-rule run serialization.
//! - [`watcher`] wires a cross-platform filesystem watcher (`notify`) into
//!   the sessions.
//!
//! The watcher knows nothing about what a target does; it only turns
//! filesystem changes into scheduler invocations and reload broadcasts.

pub mod patterns;
pub mod session;
pub mod watcher;

pub use patterns::{ChangeKind, CompiledRule, compile_rule, compile_rules};
pub use session::{SessionHandle, SessionNotifier};
pub use watcher::Watcher;
