//! A single named row of a document

use crate::observer::{CellEvent, ListenerId, Listeners};
use rowcalc_core::{CellId, IndexSet, InputDescriptor, Value, ValueKind};
use rowcalc_formula::{Expr, FormulaEngine, FormulaError, FormulaResult, Offense, Scope};
use std::cell::OnceCell;
use std::rc::Rc;

/// Options for creating a cell
#[derive(Debug, Clone, Default)]
pub struct CellOptions {
    /// Id to use; a fresh one is generated when `None`
    pub id: Option<CellId>,
    pub name: String,
    pub expression: String,
    /// Input descriptor; takes precedence over `expression`
    pub input: Option<InputDescriptor>,
    pub tags: Vec<String>,
}

impl CellOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<CellId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn input(mut self, input: InputDescriptor) -> Self {
        self.input = Some(input);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A named cell holding an expression or an externally driven value.
///
/// Mutations notify the cell's subscribers synchronously. Values computed
/// by a recomputation pass are stored without notification.
pub struct Cell {
    id: CellId,
    name: String,
    expression: String,
    ast: Expr,
    offenses: Vec<Offense>,
    /// Syntax or disallowed-capability error of the current expression
    compile_error: Option<FormulaError>,
    /// Error raised by the most recent evaluation
    eval_error: Option<FormulaError>,
    dependencies: OnceCell<Vec<String>>,
    input: Option<InputDescriptor>,
    value: Value,
    tags: IndexSet<String>,
    engine: Rc<FormulaEngine>,
    listeners: Listeners<dyn FnMut(&CellEvent)>,
}

impl Cell {
    /// Create a cell, generating an id when the options carry none
    pub fn new(options: CellOptions, engine: Rc<FormulaEngine>) -> Self {
        let mut cell = Self {
            id: options.id.unwrap_or_else(CellId::generate),
            name: options.name,
            expression: String::new(),
            ast: Expr::Empty,
            offenses: Vec::new(),
            compile_error: None,
            eval_error: None,
            dependencies: OnceCell::new(),
            input: None,
            value: Value::Absent,
            tags: options.tags.into_iter().collect(),
            engine,
            listeners: Listeners::new(),
        };

        match options.input {
            Some(input) => {
                cell.value = input.default_value();
                cell.input = Some(input);
            }
            None => cell.compile(options.expression),
        }
        cell
    }

    pub fn id(&self) -> &CellId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw expression text; empty for input-driven cells
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn input(&self) -> Option<&InputDescriptor> {
        self.input.as_ref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Kind of the current state; `Error` whenever an error is present
    pub fn value_kind(&self) -> ValueKind {
        if self.error().is_some() {
            ValueKind::Error
        } else {
            self.value.kind()
        }
    }

    /// The compile error if any, else the last evaluation error
    pub fn error(&self) -> Option<&FormulaError> {
        self.compile_error.as_ref().or(self.eval_error.as_ref())
    }

    pub fn compile_error(&self) -> Option<&FormulaError> {
        self.compile_error.as_ref()
    }

    pub fn evaluation_error(&self) -> Option<&FormulaError> {
        self.eval_error.as_ref()
    }

    /// Free names the expression reads, deduplicated in first-seen order
    pub fn dependencies(&self) -> &[String] {
        self.dependencies
            .get_or_init(|| self.engine.free_names(&self.ast))
    }

    pub fn tags(&self) -> &IndexSet<String> {
        &self.tags
    }

    /// Check if the expression passed the safety analyzer
    pub fn is_safe(&self) -> bool {
        self.offenses.is_empty()
    }

    /// Disallowed references found in the current expression
    pub fn offenses(&self) -> &[Offense] {
        &self.offenses
    }

    /// Check if the expression calls a nondeterministic builtin
    pub fn is_volatile(&self) -> bool {
        self.input.is_none() && self.engine.is_volatile(&self.ast)
    }

    /// Replace the expression text.
    ///
    /// Ignored while an input is set.
    pub fn update_expression(&mut self, expression: impl Into<String>) {
        if self.input.is_some() {
            log::debug!("ignoring expression update on input cell {}", self.id);
            return;
        }
        self.compile(expression.into());
        self.emit(CellEvent::ExpressionChanged);
    }

    /// Replace the expression text with a function of the current text
    pub fn transform_expression<F>(&mut self, transform: F)
    where
        F: FnOnce(&str) -> String,
    {
        let expression = transform(&self.expression);
        self.update_expression(expression);
    }

    /// Turn the cell into an input, discarding its expression
    pub fn set_input(&mut self, input: InputDescriptor) {
        self.clear_expression();
        self.value = input.default_value();
        self.input = Some(input);
        self.emit(CellEvent::InputSet);
    }

    /// Drop the input descriptor, returning the cell to an empty expression.
    ///
    /// Returns `false` without notifying when no input was set.
    pub fn clear_input(&mut self) -> bool {
        if self.input.take().is_none() {
            return false;
        }
        self.clear_expression();
        self.value = Value::Absent;
        self.emit(CellEvent::InputCleared);
        true
    }

    /// Assign a value from outside the recomputation pass
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
        self.emit(CellEvent::ValueChanged);
    }

    /// Change the name; other cells' expressions are left alone
    pub fn rename(&mut self, name: impl Into<String>) {
        let new = name.into();
        if new == self.name {
            return;
        }
        let old = std::mem::replace(&mut self.name, new.clone());
        self.emit(CellEvent::Renamed { old, new });
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.emit(CellEvent::TagsChanged);
    }

    /// Add a tag, returning whether it was new
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let added = self.tags.insert(tag.into());
        if added {
            self.emit(CellEvent::TagsChanged);
        }
        added
    }

    /// Remove a tag, returning whether it was present
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let removed = self.tags.shift_remove(tag);
        if removed {
            self.emit(CellEvent::TagsChanged);
        }
        removed
    }

    /// Evaluate the expression against `scope` and store the result.
    ///
    /// Input cells return their current value untouched. A runtime error
    /// is returned without touching the stored value; see [`Cell::fail`].
    pub fn evaluate(&mut self, scope: &Scope) -> FormulaResult<Value> {
        if self.input.is_some() {
            return Ok(self.value.clone());
        }
        self.eval_error = None;
        if self.compile_error.is_some() {
            self.value = Value::Absent;
            return Ok(Value::Absent);
        }
        let value = self.engine.evaluate(&self.ast, scope)?;
        self.value = value.clone();
        Ok(value)
    }

    /// Notify subscribers that the cell is going away, then drop them
    pub fn remove(&mut self) {
        self.emit(CellEvent::Removed);
        self.listeners.clear();
    }

    /// Register a listener for this cell's events
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&CellEvent) + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Store a value computed by a recomputation pass, clearing any evaluation error
    pub(crate) fn set_computed(&mut self, value: Value) {
        self.value = value;
        self.eval_error = None;
    }

    /// Record an evaluation failure; the value becomes absent
    pub(crate) fn fail(&mut self, error: FormulaError) {
        self.value = Value::Absent;
        self.eval_error = Some(error);
    }

    fn compile(&mut self, expression: String) {
        self.compile_error = None;
        self.eval_error = None;
        self.dependencies = OnceCell::new();

        match self.engine.compile(&expression) {
            Ok(compiled) => {
                self.compile_error = compiled.disallowed_error();
                if self.compile_error.is_some() {
                    self.value = Value::Absent;
                }
                self.ast = compiled.ast;
                self.offenses = compiled.offenses;
            }
            Err(err) => {
                self.ast = Expr::Empty;
                self.offenses = Vec::new();
                self.value = Value::Absent;
                self.compile_error = Some(err);
            }
        }
        self.expression = expression;
    }

    fn clear_expression(&mut self) {
        self.expression.clear();
        self.ast = Expr::Empty;
        self.offenses.clear();
        self.compile_error = None;
        self.eval_error = None;
        self.dependencies = OnceCell::new();
    }

    fn emit(&mut self, event: CellEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("expression", &self.expression)
            .field("input", &self.input)
            .field("value", &self.value)
            .field("error", &self.error())
            .field("tags", &self.tags)
            .finish()
    }
}
