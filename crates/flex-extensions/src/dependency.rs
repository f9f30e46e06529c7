//! Dependency graph and load ordering for extensions.
//!
//! Edges point from dependent to dependency: if A depends on B, the edge is
//! `A -> B`. Load order is dependency-first (B before A); unload order is
//! the exact reverse.
//!
//! # Example
//!
//! ```
//! use flex_extensions::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("org.example.base");
//! graph.add_node("org.example.theme");
//! graph.add_edge("org.example.theme", "org.example.base");
//!
//! let order = graph.load_order("org.example.theme").unwrap();
//! assert_eq!(order, vec!["org.example.base", "org.example.theme"]);
//! ```

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};
use crate::registry::ExtensionRegistry;

/// Directed graph of declared dependencies between extension ids.
///
/// Nodes keep insertion order, and so do each node's outgoing edges; both
/// orders are used to break ties so results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Adjacency list: key depends on each value. Keys are the known nodes.
    edges: IndexMap<String, IndexSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

impl DependencyGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of every registered extension, in registration order.
    ///
    /// Dependencies are ordered by the registration order of their targets;
    /// unregistered targets go last, in declaration order.
    pub fn from_registry(registry: &ExtensionRegistry) -> Self {
        let mut graph = Self::new();
        for id in registry.ids() {
            graph.add_node(id);
        }
        for extension in registry.all() {
            let mut dependencies: Vec<&String> = extension.meta.dependencies.iter().collect();
            dependencies.sort_by_key(|dep| registry.position(dep).unwrap_or(usize::MAX));
            for dependency in dependencies {
                graph.add_edge(extension.id(), dependency);
            }
        }
        graph
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add_node(&mut self, id: &str) {
        if !self.edges.contains_key(id) {
            self.edges.insert(id.to_string(), IndexSet::new());
        }
    }

    /// Declare that `from` depends on `to`.
    ///
    /// `from` is added as a node if needed; `to` is not, so a dependency on
    /// an unknown node surfaces as [`Error::MissingDependency`] when ordering.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        if let Some(deps) = self.edges.get_mut(from) {
            deps.insert(to.to_string());
        }
    }

    /// Get the direct dependencies of a node.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Get the nodes that directly depend on `id`, in node order.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.contains(id))
            .map(|(from, _)| from.as_str())
            .collect()
    }

    /// The transitive dependencies of `target` followed by `target` itself,
    /// dependencies first.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownExtension`] if `target` is not a node
    /// - [`Error::MissingDependency`] if a reachable dependency is not a node
    /// - [`Error::CyclicDependency`] with the cycle path, first id repeated
    ///   at the end
    pub fn load_order(&self, target: &str) -> Result<Vec<String>> {
        if !self.edges.contains_key(target) {
            return Err(Error::UnknownExtension(target.to_string()));
        }
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut order = Vec::new();
        self.visit(target, &mut marks, &mut stack, &mut order)?;
        Ok(order)
    }

    /// Reverse of [`load_order`](Self::load_order): `target` first, its
    /// deepest dependencies last.
    pub fn unload_order(&self, target: &str) -> Result<Vec<String>> {
        let mut order = self.load_order(target)?;
        order.reverse();
        Ok(order)
    }

    fn visit(
        &self,
        id: &str,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::OnStack) => {
                let start = stack.iter().position(|s| s == id).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].to_vec();
                cycle.push(id.to_string());
                return Err(Error::CyclicDependency { cycle });
            }
            None => {}
        }

        marks.insert(id.to_string(), Mark::OnStack);
        stack.push(id.to_string());

        if let Some(deps) = self.edges.get(id) {
            for dep in deps {
                if !self.edges.contains_key(dep) {
                    return Err(Error::MissingDependency {
                        id: dep.clone(),
                        required_by: id.to_string(),
                    });
                }
                self.visit(dep, marks, stack, order)?;
            }
        }

        stack.pop();
        marks.insert(id.to_string(), Mark::Done);
        order.push(id.to_string());
        Ok(())
    }

    /// Every node reachable backwards from `target` (its transitive
    /// dependents), dependents first, `target` excluded.
    pub fn dependents_closure(&self, target: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        self.visit_dependents(target, &mut seen, &mut order);
        order.retain(|id| id != target);
        order
    }

    fn visit_dependents(&self, id: &str, seen: &mut HashSet<String>, order: &mut Vec<String>) {
        if !seen.insert(id.to_string()) {
            return;
        }
        for dependent in self.dependents_of(id) {
            self.visit_dependents(dependent, seen, order);
        }
        // Post-order: a node lands after everything that depends on it.
        order.push(id.to_string());
    }

}

/// Load order for `target` over the registered extensions.
pub fn resolve_load_order(target: &str, registry: &ExtensionRegistry) -> Result<Vec<String>> {
    DependencyGraph::from_registry(registry).load_order(target)
}

/// Unload order for `target`: the exact reverse of its load order.
pub fn resolve_unload_order(target: &str, registry: &ExtensionRegistry) -> Result<Vec<String>> {
    DependencyGraph::from_registry(registry).unload_order(target)
}

/// Loaded transitive dependents of `target`, dependents first.
pub fn loaded_dependents_closure(target: &str, registry: &ExtensionRegistry) -> Vec<String> {
    DependencyGraph::from_registry(registry)
        .dependents_closure(target)
        .into_iter()
        .filter(|id| registry.state(id).is_some_and(|s| s.is_loaded()))
        .collect()
}
