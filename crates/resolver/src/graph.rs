//! Import graph of one resolution run
//!
//! Built from the edges the resolver discovered, for dependency queries and
//! tree views.

use crate::resolver::{cycle_key, Resolution};
use crate::{DiagnosticKind, ResolverError};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

/// How an import ended up in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Resolved,
    Missing,
    /// Import of a unit already on the path from the root
    Circular,
    /// Resolved but dropped because its symbols were already defined
    Duplicate,
    /// Not followed because of the depth limit
    Truncated,
    /// Already expanded earlier in the tree
    Shared,
}

impl NodeStatus {
    fn label(self) -> Option<&'static str> {
        match self {
            NodeStatus::Resolved => None,
            NodeStatus::Missing => Some("missing"),
            NodeStatus::Circular => Some("circular"),
            NodeStatus::Duplicate => Some("duplicate"),
            NodeStatus::Truncated => Some("depth limit"),
            NodeStatus::Shared => Some("see above"),
        }
    }
}

/// One node of a dependency tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub path: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    /// Render as an indented text tree
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.display_name());
        self.render_children("", &mut out);
        out
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    fn display_name(&self) -> String {
        match self.status.label() {
            Some(label) => format!("{} ({})", self.path, label),
            None => self.path.clone(),
        }
    }

    fn render_children(&self, prefix: &str, out: &mut String) {
        let count = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let (branch, indent) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            let _ = writeln!(out, "{}{}{}", prefix, branch, child.display_name());
            child.render_children(&format!("{}{}", prefix, indent), out);
        }
    }
}

/// Directed graph of import edges, importer to imported
pub struct ImportGraph {
    graph: DiGraph<String, ()>,
    /// Map from cycle key to node index
    node_map: HashMap<String, NodeIndex>,
    root: NodeIndex,
    statuses: HashMap<String, NodeStatus>,
}

impl ImportGraph {
    pub fn from_resolution(resolution: &Resolution) -> Self {
        let mut graph = Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            root: NodeIndex::new(0),
            statuses: HashMap::new(),
        };
        graph.root = graph.add_node(&resolution.root);

        for edge in &resolution.edges {
            let from = graph.add_node(&edge.from);
            let to = graph.add_node(&edge.to);
            graph.graph.update_edge(from, to, ());
        }

        for diagnostic in &resolution.diagnostics {
            let status = match diagnostic.kind {
                DiagnosticKind::UnresolvedImport => NodeStatus::Missing,
                DiagnosticKind::DuplicateSymbol => NodeStatus::Duplicate,
                DiagnosticKind::DepthLimitExceeded => NodeStatus::Truncated,
                _ => continue,
            };
            graph
                .statuses
                .insert(cycle_key(&diagnostic.path).to_string(), status);
        }

        graph
    }

    fn add_node(&mut self, path: &str) -> NodeIndex {
        let key = cycle_key(path);
        if let Some(&idx) = self.node_map.get(key) {
            return idx;
        }

        let idx = self.graph.add_node(path.to_string());
        self.node_map.insert(key.to_string(), idx);
        idx
    }

    fn index_of(&self, path: &str) -> Option<NodeIndex> {
        self.node_map.get(cycle_key(path)).copied()
    }

    fn status_of(&self, path: &str) -> NodeStatus {
        self.statuses
            .get(cycle_key(path))
            .copied()
            .unwrap_or(NodeStatus::Resolved)
    }

    /// Direct imports of `path`, in discovery order
    pub fn dependencies(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Units that import `path` directly, in discovery order
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<String> {
        let Some(idx) = self.index_of(path) else {
            return vec![];
        };

        let mut edges: Vec<_> = self.graph.edges_directed(idx, direction).collect();
        edges.sort_by_key(|edge| edge.id());
        edges
            .into_iter()
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                self.graph[other].clone()
            })
            .collect()
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Paths with dependencies before their importers, root last
    pub fn topological_order(&self) -> Result<Vec<String>, ResolverError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .rev()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(cycle) => Err(ResolverError::CircularDependency(format!(
                "Circular dependency detected involving: {}",
                self.graph[cycle.node_id()]
            ))),
        }
    }

    /// Dependency tree rooted at the resolution root
    ///
    /// Every unit is expanded once, at its first appearance. Later imports of
    /// a unit with dependencies of its own become leaves marked shared, and an
    /// import of a unit that is already an ancestor becomes a leaf marked
    /// circular.
    pub fn tree(&self) -> DependencyNode {
        let mut ancestors = HashSet::new();
        let mut expanded = HashSet::new();
        self.subtree(self.root, NodeStatus::Resolved, &mut ancestors, &mut expanded)
    }

    fn subtree(
        &self,
        idx: NodeIndex,
        status: NodeStatus,
        ancestors: &mut HashSet<NodeIndex>,
        expanded: &mut HashSet<NodeIndex>,
    ) -> DependencyNode {
        let path = self.graph[idx].clone();
        ancestors.insert(idx);
        expanded.insert(idx);

        let children = self
            .dependencies(&path)
            .iter()
            .filter_map(|child| self.index_of(child))
            .map(|child| {
                let has_imports = self
                    .graph
                    .neighbors_directed(child, Direction::Outgoing)
                    .next()
                    .is_some();

                if ancestors.contains(&child) {
                    self.leaf(child, NodeStatus::Circular)
                } else if has_imports && expanded.contains(&child) {
                    self.leaf(child, NodeStatus::Shared)
                } else {
                    let status = self.status_of(&self.graph[child]);
                    self.subtree(child, status, ancestors, expanded)
                }
            })
            .collect();

        ancestors.remove(&idx);
        DependencyNode {
            path,
            status,
            children,
        }
    }

    fn leaf(&self, idx: NodeIndex, status: NodeStatus) -> DependencyNode {
        DependencyNode {
            path: self.graph[idx].clone(),
            status,
            children: vec![],
        }
    }

    /// All paths in the graph
    pub fn paths(&self) -> Vec<String> {
        self.graph.node_weights().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}
