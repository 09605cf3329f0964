// src/graph/node.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::errors::GraphError;
use crate::stage::{CommandStage, Stage};

/// What a node does when the scheduler reaches it.
#[derive(Clone)]
pub enum NodeKind {
    /// Leaf unit of work wrapping an external stage.
    Task(Arc<dyn Stage>),
    /// Children run strictly in order; first failure short-circuits.
    Series(Vec<String>),
    /// Children run concurrently; all outcomes are collected.
    Parallel(Vec<String>),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Task(_) => f.write_str("Task"),
            NodeKind::Series(children) => f.debug_tuple("Series").field(children).finish(),
            NodeKind::Parallel(children) => f.debug_tuple("Parallel").field(children).finish(),
        }
    }
}

/// A named node of the task graph.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    kind: NodeKind,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

/// Collects node registrations, then validates them into a [`TaskGraph`].
///
/// Registration fails fast on duplicate names (tasks and composites share
/// one namespace); reference and cycle checks run in [`GraphBuilder::build`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: HashMap<String, Node>,
    order: Vec<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf task wrapping `stage`.
    pub fn task(
        &mut self,
        name: impl Into<String>,
        stage: impl Stage + 'static,
    ) -> Result<&mut Self, GraphError> {
        let name = name.into();
        self.insert(name, NodeKind::Task(Arc::new(stage)))
    }

    /// Register a series composite over the named children.
    pub fn series<I, S>(&mut self, name: impl Into<String>, children: I) -> Result<&mut Self, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let children = children.into_iter().map(Into::into).collect();
        self.insert(name.into(), NodeKind::Series(children))
    }

    /// Register a parallel composite over the named children.
    pub fn parallel<I, S>(&mut self, name: impl Into<String>, children: I) -> Result<&mut Self, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let children = children.into_iter().map(Into::into).collect();
        self.insert(name.into(), NodeKind::Parallel(children))
    }

    fn insert(&mut self, name: String, kind: NodeKind) -> Result<&mut Self, GraphError> {
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        self.order.push(name.clone());
        self.nodes.insert(name.clone(), Node { name, kind });
        Ok(self)
    }

    /// Validate references and acyclicity, producing the runnable graph.
    pub fn build(self) -> Result<TaskGraph, GraphError> {
        // Edge direction: composite -> child. A topological sort fails iff
        // the reference graph has a cycle.
        let mut refs: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.nodes.keys() {
            refs.add_node(name.as_str());
        }

        for (name, node) in &self.nodes {
            let (NodeKind::Series(children) | NodeKind::Parallel(children)) = &node.kind else {
                continue;
            };
            for child in children {
                if !self.nodes.contains_key(child) {
                    return Err(GraphError::UnknownReference {
                        node: name.clone(),
                        child: child.clone(),
                    });
                }
                if child == name {
                    return Err(GraphError::Cycle {
                        path: vec![name.clone(), name.clone()],
                    });
                }
                refs.add_edge(name.as_str(), child.as_str(), ());
            }
        }

        if let Err(cycle) = toposort(&refs, None) {
            let start = cycle.node_id().to_string();
            return Err(GraphError::Cycle {
                path: recover_cycle(&self.nodes, &start),
            });
        }

        Ok(TaskGraph {
            nodes: self.nodes,
            order: self.order,
        })
    }
}

/// Validated, immutable set of named nodes.
///
/// Built once at startup and shared read-only across the scheduler and the
/// watch sessions.
#[derive(Debug)]
pub struct TaskGraph {
    nodes: HashMap<String, Node>,
    order: Vec<String>,
}

impl TaskGraph {
    /// Look up a node by name.
    pub fn resolve(&self, name: &str) -> Result<&Node, GraphError> {
        self.nodes
            .get(name)
            .ok_or_else(|| GraphError::NotFound(name.to_string()))
    }

    /// Node names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build the graph from a declarative config, binding every task to a
    /// [`CommandStage`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self, GraphError> {
        let mut builder = GraphBuilder::new();
        for (name, task) in &cfg.task {
            builder.task(name.clone(), CommandStage::new(task.cmd.as_str()))?;
        }
        for (name, group) in &cfg.series {
            builder.series(name.clone(), group.steps.clone())?;
        }
        for (name, group) in &cfg.parallel {
            builder.parallel(name.clone(), group.steps.clone())?;
        }
        builder.build()
    }
}

/// Walk composite references from `start` back to itself to report the full
/// cycle path. `start` is known to lie on a cycle (toposort said so).
fn recover_cycle(nodes: &HashMap<String, Node>, start: &str) -> Vec<String> {
    fn children<'a>(nodes: &'a HashMap<String, Node>, name: &str) -> &'a [String] {
        match nodes.get(name).map(Node::kind) {
            Some(NodeKind::Series(c) | NodeKind::Parallel(c)) => c,
            _ => &[],
        }
    }

    fn dfs(
        nodes: &HashMap<String, Node>,
        current: &str,
        target: &str,
        seen: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        for child in children(nodes, current) {
            if child == target {
                path.push(child.clone());
                return true;
            }
            if seen.insert(child.clone()) {
                path.push(child.clone());
                if dfs(nodes, child, target, seen, path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    let mut path = vec![start.to_string()];
    let mut seen = HashSet::new();
    dfs(nodes, start, start, &mut seen, &mut path);
    path
}
