//! The document: an ordered set of cells plus the recomputation scheduler

use crate::calculation::RecalcStats;
use crate::cell::{Cell, CellOptions};
use crate::observer::{CellEvent, ListenerId, Listeners};
use rowcalc_core::{CellId, Error, IndexMap, InputDescriptor, Result, Value};
use rowcalc_formula::{
    renamed_reference, rewrite_identifiers, CapabilityPolicy, DependencyGraph, EvalLimits,
    FormulaEngine,
};
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Options for building a document
#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    /// Names visible to every cell in addition to its resolved upstream cells
    pub context: IndexMap<String, Value>,
    /// Capability policy expressions are checked against
    pub policy: CapabilityPolicy,
    /// Parser and interpreter limits
    pub limits: EvalLimits,
}

impl DocumentOptions {
    /// Add a global context entry
    pub fn with_context(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }
}

type Inbox = Rc<RefCell<Vec<(CellId, CellEvent)>>>;
type ChangeListener = dyn FnMut(&Document, &RecalcStats);

/// A reactive collection of named cells.
///
/// Every mutating operation runs to completion, including the full
/// recomputation it triggers, before returning. Change listeners are
/// notified once per recomputation pass.
pub struct Document {
    pub(crate) engine: Rc<FormulaEngine>,
    pub(crate) context: IndexMap<String, Value>,
    pub(crate) cells: IndexMap<CellId, Cell>,
    /// Name → id, earliest-inserted cell first
    name_index: OnceCell<HashMap<String, CellId>>,
    pub(crate) graph: DependencyGraph,
    /// Events emitted by owned cells, drained after each operation
    inbox: Inbox,
    subscriptions: HashMap<CellId, ListenerId>,
    listeners: Listeners<ChangeListener>,
    pub(crate) last_stats: RecalcStats,
}

impl Document {
    pub fn new(options: DocumentOptions) -> Self {
        Self {
            engine: Rc::new(FormulaEngine::new(options.policy, options.limits)),
            context: options.context,
            cells: IndexMap::new(),
            name_index: OnceCell::new(),
            graph: DependencyGraph::new(),
            inbox: Rc::new(RefCell::new(Vec::new())),
            subscriptions: HashMap::new(),
            listeners: Listeners::new(),
            last_stats: RecalcStats::default(),
        }
    }

    /// Engine shared by every cell of this document
    pub fn engine(&self) -> &FormulaEngine {
        &self.engine
    }

    /// Global context visible to every cell
    pub fn context(&self) -> &IndexMap<String, Value> {
        &self.context
    }

    /// Replace or add a global context entry and recompute
    pub fn set_context(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.context.insert(name.into(), value.into());
        self.recompute_all();
    }

    /// Add a cell and recompute, returning its id
    pub fn add_cell(&mut self, options: CellOptions) -> Result<CellId> {
        let id = self.insert_cell(options)?;
        self.recompute_all();
        Ok(id)
    }

    /// Register a cell without recomputing
    pub(crate) fn insert_cell(&mut self, options: CellOptions) -> Result<CellId> {
        if let Some(id) = &options.id {
            if self.cells.contains_key(id) {
                return Err(Error::DuplicateId(id.clone()));
            }
        }
        if self.name_index().contains_key(&options.name) {
            log::warn!(
                "cell name '{}' is already in use; references resolve to the earlier cell",
                options.name
            );
        }

        let mut cell = Cell::new(options, Rc::clone(&self.engine));
        let id = cell.id().clone();

        let inbox = Rc::clone(&self.inbox);
        let source = id.clone();
        let subscription =
            cell.subscribe(move |event| inbox.borrow_mut().push((source.clone(), event.clone())));

        self.subscriptions.insert(id.clone(), subscription);
        self.graph.add_node(id.clone());
        self.cells.insert(id.clone(), cell);
        self.invalidate_names();
        Ok(id)
    }

    /// Remove a cell; cells that referenced it see an unresolved name
    pub fn remove_cell(&mut self, id: &CellId) -> Result<()> {
        let cell = self.cell_mut(id)?;
        cell.remove();

        self.subscriptions.remove(id);
        self.cells.shift_remove(id);
        self.graph.remove_node(id);
        self.invalidate_names();
        self.flush();
        Ok(())
    }

    /// Rename a cell and rewrite every expression that references it.
    ///
    /// Fails with [`Error::InvalidName`] when expressions could not refer
    /// to the new name, and with [`Error::NameTaken`] when another cell
    /// already uses it; nothing changes in either case.
    pub fn rename_cell(&mut self, id: &CellId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let old = self.cell_mut(id)?.name().to_string();
        if old == name {
            return Ok(());
        }
        if !self.engine.is_valid_name(&name) {
            return Err(Error::InvalidName(name));
        }
        if let Some(owner) = self.name_index().get(&name) {
            if owner != id {
                return Err(Error::NameTaken(name));
            }
        }

        // Rewrite only the spellings that resolve to the renamed cell
        let mut rewrites = Vec::new();
        for cell in self.cells.values() {
            let references = cell
                .dependencies()
                .iter()
                .any(|dep| self.resolve_name(dep) == Some(id));
            if !references {
                continue;
            }
            let expression = rewrite_identifiers(cell.expression(), cell.ast(), |ident| {
                if self.resolve_name(ident) == Some(id) {
                    renamed_reference(ident, &old, &name)
                } else {
                    None
                }
            });
            rewrites.push((cell.id().clone(), expression));
        }

        self.cell_mut(id)?.rename(name);
        for (dependent, expression) in rewrites {
            self.cell_mut(&dependent)?.update_expression(expression);
        }
        self.flush();
        Ok(())
    }

    pub fn update_expression(&mut self, id: &CellId, expression: impl Into<String>) -> Result<()> {
        self.cell_mut(id)?.update_expression(expression);
        self.flush();
        Ok(())
    }

    /// Replace a cell's expression with a function of its current text
    pub fn transform_expression<F>(&mut self, id: &CellId, transform: F) -> Result<()>
    where
        F: FnOnce(&str) -> String,
    {
        self.cell_mut(id)?.transform_expression(transform);
        self.flush();
        Ok(())
    }

    pub fn set_input(&mut self, id: &CellId, input: InputDescriptor) -> Result<()> {
        self.cell_mut(id)?.set_input(input);
        self.flush();
        Ok(())
    }

    /// Return an input cell to expression mode with an empty expression
    pub fn clear_input(&mut self, id: &CellId) -> Result<()> {
        self.cell_mut(id)?.clear_input();
        self.flush();
        Ok(())
    }

    /// Assign a cell's value directly, without validation
    pub fn set_value(&mut self, id: &CellId, value: impl Into<Value>) -> Result<()> {
        self.cell_mut(id)?.set_value(value.into());
        self.flush();
        Ok(())
    }

    /// Assign an input cell's value after checking it against its descriptor
    pub fn set_input_value(&mut self, id: &CellId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let cell = self.cell_mut(id)?;
        let input = cell
            .input()
            .ok_or_else(|| Error::InvalidInputValue(format!("cell {} has no input", id)))?;
        input.validate(&value)?;
        cell.set_value(value);
        self.flush();
        Ok(())
    }

    pub fn set_tags<I, S>(&mut self, id: &CellId, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cell_mut(id)?.set_tags(tags);
        self.flush();
        Ok(())
    }

    pub fn add_tag(&mut self, id: &CellId, tag: impl Into<String>) -> Result<bool> {
        let added = self.cell_mut(id)?.add_tag(tag);
        self.flush();
        Ok(added)
    }

    pub fn remove_tag(&mut self, id: &CellId, tag: &str) -> Result<bool> {
        let removed = self.cell_mut(id)?.remove_tag(tag);
        self.flush();
        Ok(removed)
    }

    pub fn cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    /// Look up a cell by name, using the same resolution as expressions
    pub fn cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.resolve_name(name).and_then(|id| self.cells.get(id))
    }

    /// Snapshot of every cell in insertion order
    pub fn cells(&self) -> Vec<&Cell> {
        self.cells.values().collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Map a referenced name to a cell id.
    ///
    /// An exact name match wins; otherwise a single leading `$` is
    /// stripped and the remainder looked up.
    pub fn resolve_name(&self, name: &str) -> Option<&CellId> {
        let index = self.name_index();
        index
            .get(name)
            .or_else(|| name.strip_prefix('$').and_then(|bare| index.get(bare)))
    }

    /// Dependency graph of the last recomputation pass
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Statistics of the last recomputation pass
    pub fn last_stats(&self) -> &RecalcStats {
        &self.last_stats
    }

    /// Ids of cells whose expressions call nondeterministic builtins
    pub fn volatile_cells(&self) -> Vec<&CellId> {
        self.cells
            .values()
            .filter(|cell| cell.is_volatile())
            .map(Cell::id)
            .collect()
    }

    /// Register a listener called once after every recomputation pass
    pub fn on_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&Document, &RecalcStats) + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Subscribe to one cell's events
    pub fn subscribe_cell<F>(&mut self, id: &CellId, listener: F) -> Result<ListenerId>
    where
        F: FnMut(&CellEvent) + 'static,
    {
        Ok(self.cell_mut(id)?.subscribe(listener))
    }

    pub fn unsubscribe_cell(&mut self, id: &CellId, listener: ListenerId) -> Result<bool> {
        // The document's own subscription is not the caller's to remove
        if self.subscriptions.get(id) == Some(&listener) {
            return Ok(false);
        }
        Ok(self.cell_mut(id)?.unsubscribe(listener))
    }

    pub(crate) fn notify(&mut self, stats: &RecalcStats) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners.iter_mut() {
            listener(self, stats);
        }
        self.listeners = listeners;
    }

    fn cell_mut(&mut self, id: &CellId) -> Result<&mut Cell> {
        self.cells
            .get_mut(id)
            .ok_or_else(|| Error::CellNotFound(id.clone()))
    }

    fn name_index(&self) -> &HashMap<String, CellId> {
        self.name_index.get_or_init(|| {
            let mut index = HashMap::with_capacity(self.cells.len());
            for cell in self.cells.values() {
                index
                    .entry(cell.name().to_string())
                    .or_insert_with(|| cell.id().clone());
            }
            index
        })
    }

    fn invalidate_names(&mut self) {
        self.name_index.take();
    }

    /// Apply events emitted by cells during the last operation
    fn flush(&mut self) {
        let events = std::mem::take(&mut *self.inbox.borrow_mut());
        let mut recompute = false;
        for (id, event) in &events {
            log::trace!("cell {} emitted {:?}", id, event);
            if let CellEvent::Renamed { .. } = event {
                self.invalidate_names();
            }
            recompute |= event.requires_recompute();
        }
        if recompute {
            self.recompute_all();
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DocumentOptions::default())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("cells", &self.cells.values().collect::<Vec<_>>())
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(doc: &Document) -> Vec<&str> {
        doc.cells().into_iter().map(Cell::name).collect()
    }

    #[test]
    fn test_add_and_resolve() {
        let mut doc = Document::default();
        let a = doc
            .add_cell(CellOptions::new("a").expression("1"))
            .unwrap();
        let b = doc
            .add_cell(CellOptions::new("b").id("fixed").expression("$a + 1"))
            .unwrap();

        assert_eq!(b.as_str(), "fixed");
        assert_eq!(doc.resolve_name("a"), Some(&a));
        assert_eq!(doc.resolve_name("$a"), Some(&a));
        assert_eq!(doc.resolve_name("c"), None);
        assert_eq!(names(&doc), vec!["a", "b"]);
        assert_eq!(doc.cell(&b).unwrap().value(), &Value::from(2.0));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut doc = Document::default();
        doc.add_cell(CellOptions::new("a").id("x")).unwrap();
        assert!(matches!(
            doc.add_cell(CellOptions::new("b").id("x")),
            Err(Error::DuplicateId(_))
        ));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_unknown_id() {
        let mut doc = Document::default();
        let missing = CellId::new("missing");
        assert!(matches!(
            doc.update_expression(&missing, "1"),
            Err(Error::CellNotFound(_))
        ));
        assert!(doc.remove_cell(&missing).is_err());
    }

    #[test]
    fn test_remove_cell() {
        let mut doc = Document::default();
        let a = doc.add_cell(CellOptions::new("a").expression("1")).unwrap();
        let b = doc.add_cell(CellOptions::new("b").expression("a + 1")).unwrap();

        doc.remove_cell(&a).unwrap();
        assert!(doc.cell(&a).is_none());
        assert!(!doc.graph().contains(&a));
        let b = doc.cell(&b).unwrap();
        assert!(b.value().is_absent());
        assert!(b.error().is_none());
    }

    #[test]
    fn test_set_input_value_validates() {
        let mut doc = Document::default();
        let n = doc
            .add_cell(CellOptions::new("n").input(InputDescriptor::number(0.0, 10.0, 1.0, 1.0)))
            .unwrap();
        let plain = doc.add_cell(CellOptions::new("p").expression("1")).unwrap();

        doc.set_input_value(&n, 7.0).unwrap();
        assert_eq!(doc.cell(&n).unwrap().value(), &Value::from(7.0));
        assert!(matches!(
            doc.set_input_value(&n, 70.0),
            Err(Error::InvalidInputValue(_))
        ));
        assert_eq!(doc.cell(&n).unwrap().value(), &Value::from(7.0));
        assert!(doc.set_input_value(&plain, 1.0).is_err());
    }

    #[test]
    fn test_on_change_fires_once_per_operation() {
        let mut doc = Document::default();
        let count = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&count);
        let listener = doc.on_change(move |_, _| *seen.borrow_mut() += 1);

        let a = doc.add_cell(CellOptions::new("a").expression("1")).unwrap();
        doc.add_cell(CellOptions::new("b").expression("a")).unwrap();
        doc.rename_cell(&a, "c").unwrap();
        doc.add_tag(&a, "t").unwrap();
        assert_eq!(*count.borrow(), 3);

        assert!(doc.remove_listener(listener));
        doc.update_expression(&a, "2").unwrap();
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn test_listener_sees_document() {
        let mut doc = Document::default();
        let values = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&values);
        doc.on_change(move |doc, _| {
            let total = doc.cell_by_name("total").map(|c| c.value().clone());
            seen.borrow_mut().push(total);
        });

        doc.add_cell(CellOptions::new("total").expression("40 + 2"))
            .unwrap();
        assert_eq!(*values.borrow(), vec![Some(Value::from(42.0))]);
    }

    #[test]
    fn test_cell_subscription() {
        let mut doc = Document::default();
        let a = doc.add_cell(CellOptions::new("a").expression("1")).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let listener = doc
            .subscribe_cell(&a, move |event| sink.borrow_mut().push(event.clone()))
            .unwrap();

        doc.update_expression(&a, "2").unwrap();
        assert!(doc.unsubscribe_cell(&a, listener).unwrap());
        doc.update_expression(&a, "3").unwrap();

        assert_eq!(*events.borrow(), vec![CellEvent::ExpressionChanged]);
        assert_eq!(doc.cell(&a).unwrap().value(), &Value::from(3.0));
    }

    #[test]
    fn test_context() {
        let options = DocumentOptions::default().with_context("rate", 0.5);
        let mut doc = Document::new(options);
        let a = doc
            .add_cell(CellOptions::new("a").expression("rate * 10"))
            .unwrap();
        assert_eq!(doc.cell(&a).unwrap().value(), &Value::from(5.0));

        doc.set_context("rate", 2.0);
        assert_eq!(doc.cell(&a).unwrap().value(), &Value::from(20.0));
    }

    #[test]
    fn test_volatile_cells() {
        let mut doc = Document::default();
        let r = doc
            .add_cell(CellOptions::new("r").expression("Math.random()"))
            .unwrap();
        doc.add_cell(CellOptions::new("s").expression("1")).unwrap();
        assert_eq!(doc.volatile_cells(), vec![&r]);
    }
}
