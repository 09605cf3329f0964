// src/stage/mod.rs

//! Stage functions: the opaque units of work a task wraps.
//!
//! The orchestration core never inspects what a stage does; it only awaits
//! the returned future and folds the result into a run outcome. The shipped
//! binary binds every configured task to a [`CommandStage`]; library users
//! can register any async closure or their own [`Stage`] impl.

pub mod command;

pub use command::CommandStage;

use std::future::Future;
use std::pin::Pin;

use crate::sched::RunContext;

/// Boxed future, used at the stage seam and for scheduler recursion.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A unit of build work invoked by the scheduler.
///
/// Stages must be safe to call repeatedly and should not retain state across
/// invocations beyond what they recompute from their inputs. Cancellation is
/// checked by the scheduler at child-start boundaries; a stage that has
/// already started runs to natural completion.
pub trait Stage: Send + Sync {
    fn run(&self, ctx: RunContext) -> BoxFuture<anyhow::Result<()>>;
}

/// Any async closure taking a [`RunContext`] is a stage.
impl<F, Fut> Stage for F
where
    F: Fn(RunContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn run(&self, ctx: RunContext) -> BoxFuture<anyhow::Result<()>> {
        Box::pin(self(ctx))
    }
}
