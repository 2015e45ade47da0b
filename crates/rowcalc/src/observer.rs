//! Change notification
//!
//! Every entity that emits notifications owns a [`Listeners`] list.
//! Dispatch is synchronous and runs listeners in registration order.

use rowcalc_core::IndexMap;
use std::fmt;

/// Handle returned when registering a listener, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Notification emitted by a cell after a state change
#[derive(Debug, Clone, PartialEq)]
pub enum CellEvent {
    /// Expression text was replaced
    ExpressionChanged,
    /// An input descriptor was attached
    InputSet,
    /// The input descriptor was removed; the cell is expression-driven again
    InputCleared,
    /// The value was assigned from outside the recomputation pass
    ValueChanged,
    /// The cell's name changed
    Renamed { old: String, new: String },
    /// The tag set changed
    TagsChanged,
    /// The cell is being removed; emitted once, after which all listeners are dropped
    Removed,
}

impl CellEvent {
    /// Check if this event invalidates computed values
    pub fn requires_recompute(&self) -> bool {
        matches!(
            self,
            CellEvent::ExpressionChanged
                | CellEvent::InputSet
                | CellEvent::InputCleared
                | CellEvent::ValueChanged
                | CellEvent::Removed
        )
    }
}

/// Ordered list of listener callbacks
pub struct Listeners<F: ?Sized> {
    next_id: u64,
    entries: IndexMap<ListenerId, Box<F>>,
}

impl<F: ?Sized> Listeners<F> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: IndexMap::new(),
        }
    }

    /// Register a listener
    pub fn add(&mut self, listener: Box<F>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, listener);
        id
    }

    /// Unregister a listener, returning whether it was registered
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    /// Drop every listener
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Listeners in registration order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut F> {
        self.entries.values_mut().map(|listener| listener.as_mut())
    }
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish()
    }
}
