// src/graph/mod.rs

//! Task graph: named leaf tasks and series/parallel composites.
//!
//! - [`node`] holds the node model, the builder and the validated graph.
//!
//! Composites reference their children by name, so a child can be shared
//! between several composites. The builder validates name uniqueness,
//! reference resolution and acyclicity; an unvalidated graph cannot exist.

pub mod node;

pub use node::{GraphBuilder, Node, NodeKind, TaskGraph};
