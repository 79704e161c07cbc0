use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use cellflow_engine::engine::{
    Cell, CellRef, CellValue, DependencyGraph, Evaluation, GridBounds, evaluate, parse,
};

use super::observe::{ChangeEvent, Observers, Subscription};
use crate::error::WriteError;

/// Anything that can name a cell: an A1 string or a [`CellRef`].
pub trait Address {
    /// The cell, if it lies inside `bounds`.
    fn locate(&self, bounds: &GridBounds) -> Result<CellRef, WriteError>;
}

impl Address for str {
    fn locate(&self, bounds: &GridBounds) -> Result<CellRef, WriteError> {
        bounds
            .resolve(self)
            .ok_or_else(|| WriteError::InvalidAddress(self.to_string()))
    }
}

impl Address for String {
    fn locate(&self, bounds: &GridBounds) -> Result<CellRef, WriteError> {
        self.as_str().locate(bounds)
    }
}

impl Address for CellRef {
    fn locate(&self, bounds: &GridBounds) -> Result<CellRef, WriteError> {
        if bounds.contains(self) {
            Ok(self.clone())
        } else {
            Err(WriteError::InvalidAddress(format!(
                "column {}, row {}",
                self.col + 1,
                self.row + 1
            )))
        }
    }
}

/// Counts reported for diagnostics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SheetStats {
    pub total_cells: usize,
    pub formula_cells: usize,
    pub total_dependency_edges: usize,
}

/// UI-agnostic spreadsheet state: the cell store, its dependency graph and
/// the snapshot metadata.
///
/// Single-writer and synchronous: every operation runs to completion,
/// including recalculation of dependents, before it returns.
pub struct Spreadsheet {
    /// Stored cells in row-major order.
    pub(crate) cells: BTreeMap<CellRef, Cell>,
    /// Edges for every cell whose formula was accepted or failed only at evaluation.
    pub(crate) graph: DependencyGraph,
    pub(crate) bounds: GridBounds,
    /// Bumped on every write that reaches evaluation and on clears; adopted from imports.
    pub(crate) version: u64,
    pub(crate) last_modified: DateTime<Utc>,
    pub(crate) observers: Observers,
}

impl Spreadsheet {
    /// An empty sheet over the default 10 x 5 grid.
    pub fn new() -> Self {
        Self::with_bounds(GridBounds::default())
    }

    pub fn with_bounds(bounds: GridBounds) -> Self {
        Spreadsheet {
            cells: BTreeMap::new(),
            graph: DependencyGraph::new(),
            bounds,
            version: 0,
            last_modified: Utc::now(),
            observers: Observers::default(),
        }
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Register a change observer.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        self.observers.subscribe(Box::new(callback))
    }

    pub(crate) fn notify(&self, event: ChangeEvent) {
        tracing::trace!(observers = self.observers.len(), ?event, "notifying");
        self.observers.notify(&event);
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
        self.last_modified = Utc::now();
    }

    /// Evaluate cell input against the current stored values.
    pub(crate) fn evaluate(&self, text: &str) -> Evaluation {
        let cells = &self.cells;
        let source = |cell: &CellRef| -> Option<CellValue> {
            cells.get(cell).and_then(|c| c.value.clone())
        };
        evaluate(text, &self.bounds, &source)
    }

    /// The in-grid cells a formula reads, de-duplicated, in first-occurrence order.
    pub(crate) fn formula_dependencies(&self, formula: &str) -> Vec<CellRef> {
        let mut deps: Vec<CellRef> = Vec::new();
        for cell in parse(formula)
            .dependencies
            .iter()
            .filter_map(|name| self.bounds.resolve(name))
        {
            if !deps.contains(&cell) {
                deps.push(cell);
            }
        }
        deps
    }
}

impl Default for Spreadsheet {
    fn default() -> Self {
        Self::new()
    }
}
