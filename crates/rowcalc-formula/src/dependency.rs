//! Dependency tracking for recomputation

use indexmap::{IndexMap, IndexSet};
use rowcalc_core::CellId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Dependency graph over cells
///
/// An edge runs from a precedent (the referenced cell) to each of its
/// dependents. Nodes and edges keep insertion order so that every
/// traversal is deterministic.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: IndexSet<CellId>,
    /// Cell → Cells that depend on it (dependents)
    dependents: IndexMap<CellId, IndexSet<CellId>>,
    /// Cell → Cells it depends on (precedents)
    precedents: IndexMap<CellId, IndexSet<CellId>>,
}

/// Result of ordering a graph for evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationOrder {
    /// Cells in an order where every precedent comes before its dependents
    pub ordered: Vec<CellId>,
    /// Cells that could not be ordered: cycle members and everything downstream of them
    pub blocked: Vec<CellId>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cell with no edges (no-op if present)
    pub fn add_node(&mut self, cell: CellId) {
        self.nodes.insert(cell);
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellId, dependent: CellId) {
        self.nodes.insert(precedent.clone());
        self.nodes.insert(dependent.clone());
        self.dependents
            .entry(precedent.clone())
            .or_default()
            .insert(dependent.clone());
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Remove a cell and every edge touching it
    pub fn remove_node(&mut self, cell: &CellId) {
        // Remove from all precedents' dependents list
        if let Some(precedents) = self.precedents.shift_remove(cell) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.shift_remove(cell);
                }
            }
        }

        // Remove as a precedent for others
        if let Some(dependents) = self.dependents.shift_remove(cell) {
            for dependent in dependents {
                if let Some(precs) = self.precedents.get_mut(&dependent) {
                    precs.shift_remove(cell);
                }
            }
        }

        self.nodes.shift_remove(cell);
    }

    pub fn contains(&self, cell: &CellId) -> bool {
        self.nodes.contains(cell)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get cells that depend on the given cell
    pub fn get_dependents<'a>(&'a self, cell: &CellId) -> impl Iterator<Item = &'a CellId> + 'a {
        self.dependents.get(cell).into_iter().flatten()
    }

    /// Get cells that the given cell depends on
    pub fn get_precedents<'a>(&'a self, cell: &CellId) -> impl Iterator<Item = &'a CellId> + 'a {
        self.precedents.get(cell).into_iter().flatten()
    }

    /// Order every cell for evaluation (Kahn's algorithm).
    ///
    /// The ready queue is seeded in node insertion order, so independent
    /// cells keep their relative order. Cells on or downstream of a cycle
    /// never become ready and are returned in `blocked`.
    pub fn evaluation_order(&self) -> EvaluationOrder {
        let mut in_degree: HashMap<&CellId, usize> = self
            .nodes
            .iter()
            .map(|cell| (cell, self.get_precedents(cell).count()))
            .collect();

        let mut ready: VecDeque<&CellId> = self
            .nodes
            .iter()
            .filter(|cell| in_degree.get(cell) == Some(&0))
            .collect();

        let mut ordered = Vec::with_capacity(self.nodes.len());
        while let Some(cell) = ready.pop_front() {
            ordered.push(cell.clone());
            for dependent in self.get_dependents(cell) {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        let placed: HashSet<&CellId> = ordered.iter().collect();
        let blocked = self
            .nodes
            .iter()
            .filter(|cell| !placed.contains(cell))
            .cloned()
            .collect();

        EvaluationOrder { ordered, blocked }
    }

    /// Check if a cell can reach itself through its dependents
    pub fn has_circular_reference(&self, cell: &CellId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<&CellId> = self.get_dependents(cell).collect();

        while let Some(next) = stack.pop() {
            if next == cell {
                return true;
            }
            if visited.insert(next) {
                stack.extend(self.get_dependents(next));
            }
        }

        false
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.dependents.clear();
        self.precedents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(names: &[&str]) -> Vec<CellId> {
        names.iter().map(|n| CellId::from(*n)).collect()
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();
        let a = CellId::from("a");
        let b = CellId::from("b");

        graph.add_dependency(a.clone(), b.clone());

        assert!(graph.get_dependents(&a).any(|c| *c == b));
        assert!(graph.get_precedents(&b).any(|c| *c == a));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_order_respects_edges_and_insertion() {
        let mut graph = DependencyGraph::new();
        for id in ids(&["c", "a", "x", "b"]) {
            graph.add_node(id);
        }
        // c depends on b, b depends on a
        graph.add_dependency("a".into(), "b".into());
        graph.add_dependency("b".into(), "c".into());

        let order = graph.evaluation_order();
        assert_eq!(order.ordered, ids(&["a", "x", "b", "c"]));
        assert!(order.blocked.is_empty());
    }

    #[test]
    fn test_cycle_blocks_members_and_downstream() {
        let mut graph = DependencyGraph::new();
        for id in ids(&["a", "b", "c", "d"]) {
            graph.add_node(id);
        }
        // a <-> b, c depends on b, d independent
        graph.add_dependency("a".into(), "b".into());
        graph.add_dependency("b".into(), "a".into());
        graph.add_dependency("b".into(), "c".into());

        let order = graph.evaluation_order();
        assert_eq!(order.ordered, ids(&["d"]));
        assert_eq!(order.blocked, ids(&["a", "b", "c"]));

        assert!(graph.has_circular_reference(&"a".into()));
        assert!(graph.has_circular_reference(&"b".into()));
        assert!(!graph.has_circular_reference(&"c".into()));
        assert!(!graph.has_circular_reference(&"d".into()));
    }

    #[test]
    fn test_self_reference() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a".into(), "a".into());
        assert!(graph.has_circular_reference(&"a".into()));
        assert_eq!(graph.evaluation_order().blocked, ids(&["a"]));
    }

    #[test]
    fn test_remove_node() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a".into(), "b".into());
        graph.remove_node(&"a".into());

        assert!(!graph.contains(&"a".into()));
        assert_eq!(graph.get_precedents(&"b".into()).count(), 0);
        assert_eq!(graph.evaluation_order().ordered, ids(&["b"]));
    }
}
