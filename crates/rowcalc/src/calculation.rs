//! Document recomputation
//!
//! Every structural or content change triggers one full pass:
//!
//! 1. Rebuild the dependency graph from each cell's resolvable dependencies.
//! 2. Order the graph (Kahn's algorithm, ties broken by insertion order).
//!    Cells that cannot be ordered are cycle members or lie downstream of one.
//! 3. Visit ordered cells. A cell with an unresolved or absent dependency
//!    becomes absent without being interpreted; any other cell is evaluated
//!    against the global context plus its upstream values. A runtime error
//!    is recorded on the cell and the pass continues.
//! 4. Notify change listeners once.
//!
//! # Example
//!
//! ```rust
//! use rowcalc::prelude::*;
//!
//! let mut doc = Document::default();
//! doc.add_cell(CellOptions::new("a").expression("10")).unwrap();
//! let b = doc.add_cell(CellOptions::new("b").expression("$a * 2")).unwrap();
//!
//! let stats = doc.recompute_all();
//! assert_eq!(stats.cells_evaluated, 2);
//! assert_eq!(doc.cell(&b).unwrap().value(), &Value::from(20.0));
//! ```

use crate::cell::Cell;
use crate::document::Document;
use rowcalc_core::{IndexMap, Value};
use rowcalc_formula::{DependencyGraph, FormulaError, Scope};

/// Statistics from a recomputation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalcStats {
    /// Cells whose expression was interpreted
    pub cells_evaluated: usize,
    /// Cells set to absent because a dependency was unresolved, absent or blocked
    pub cells_absent: usize,
    /// Cells carrying an error after the pass
    pub errors: usize,
    /// Cells that take part in a circular reference
    pub cycles: usize,
}

/// What a cell's dependencies resolved to
enum Inputs {
    Ready(Scope),
    Missing,
}

impl Document {
    /// Recompute every cell in dependency order
    pub fn recompute_all(&mut self) -> RecalcStats {
        let mut stats = RecalcStats::default();

        // Phase 1: rebuild the graph from scratch
        self.graph = build_graph(self);

        // Phase 2: order cells; anything left over is blocked by a cycle
        let order = self.graph.evaluation_order();
        for id in &order.blocked {
            let circular = self.graph.has_circular_reference(id);
            let Some(cell) = self.cells.get_mut(id) else {
                continue;
            };
            if !cell.is_safe() {
                continue;
            }
            if circular {
                log::warn!("cell '{}' is part of a circular reference", cell.name());
                cell.fail(FormulaError::CircularReference);
                stats.cycles += 1;
            } else {
                cell.set_computed(Value::Absent);
                stats.cells_absent += 1;
            }
        }

        // Phase 3: evaluate in order
        for id in &order.ordered {
            let inputs = match self.cells.get(id) {
                Some(cell) if cell.is_safe() && cell.input().is_none() => {
                    gather_inputs(self, cell)
                }
                _ => continue,
            };
            let Some(cell) = self.cells.get_mut(id) else {
                continue;
            };

            match inputs {
                Inputs::Missing => {
                    log::trace!("cell '{}' has a missing input", cell.name());
                    cell.set_computed(Value::Absent);
                    stats.cells_absent += 1;
                }
                Inputs::Ready(scope) => {
                    stats.cells_evaluated += 1;
                    match cell.evaluate(&scope) {
                        Ok(value) => log::trace!("cell '{}' = {}", cell.name(), value),
                        Err(err) => {
                            log::trace!("cell '{}' failed: {}", cell.name(), err);
                            cell.fail(err);
                        }
                    }
                }
            }
        }

        stats.errors = self
            .cells
            .values()
            .filter(|cell| cell.error().is_some())
            .count();

        log::debug!(
            "recomputed {} cells: {} evaluated, {} absent, {} errors, {} in cycles",
            self.cells.len(),
            stats.cells_evaluated,
            stats.cells_absent,
            stats.errors,
            stats.cycles
        );

        // Phase 4: notify once
        self.last_stats = stats.clone();
        self.notify(&stats);
        stats
    }
}

/// One node per cell, one edge per dependency that resolves to a cell
fn build_graph(doc: &Document) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for id in doc.cells.keys() {
        graph.add_node(id.clone());
    }
    for cell in doc.cells.values() {
        for name in cell.dependencies() {
            if let Some(precedent) = doc.resolve_name(name) {
                graph.add_dependency(precedent.clone(), cell.id().clone());
            }
        }
    }
    graph
}

/// Build the scope for `cell`, or report that some dependency has no value.
///
/// Names that resolve to no cell fall back to the global context.
fn gather_inputs(doc: &Document, cell: &Cell) -> Inputs {
    let mut upstream: IndexMap<&str, Value> = IndexMap::new();
    for name in cell.dependencies() {
        let value = match doc.resolve_name(name).and_then(|id| doc.cells.get(id)) {
            Some(dep) => dep.value(),
            None => match doc.context.get(name) {
                Some(value) => value,
                None => return Inputs::Missing,
            },
        };
        if value.is_absent() {
            return Inputs::Missing;
        }
        upstream.insert(name, value.clone());
    }

    let mut scope: Scope = doc
        .context
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    scope.extend(
        upstream
            .into_iter()
            .map(|(name, value)| (name.to_string(), value)),
    );
    Inputs::Ready(scope)
}
