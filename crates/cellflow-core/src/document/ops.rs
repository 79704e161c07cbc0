use cellflow_engine::engine::{Cell, CellInput, CellRef, CellValue, ErrorCode, validate};

use super::observe::ChangeEvent;
use super::state::{Address, SheetStats};
use super::Spreadsheet;
use crate::error::WriteError;

impl Spreadsheet {
    /// Write a literal or formula into a cell.
    ///
    /// `Ok` means the write was accepted. On `Err` the cell is still stored
    /// with the error visible, except for an invalid address or a NaN or
    /// infinite number, which change nothing.
    pub fn set<A>(&mut self, id: &A, input: impl Into<CellInput>) -> Result<(), WriteError>
    where
        A: Address + ?Sized,
    {
        let cell_ref = id.locate(&self.bounds)?;
        let input = input.into();
        if let CellInput::Number(n) = input {
            if !n.is_finite() {
                return Err(WriteError::NotFinite(n));
            }
        }
        let result = self.write(&cell_ref, input);

        match &result {
            Ok(()) => tracing::debug!(cell = %cell_ref, "write accepted"),
            Err(err) => tracing::debug!(cell = %cell_ref, error = %err, "write rejected"),
        }
        self.notify(ChangeEvent::CellWritten {
            cell: cell_ref,
            accepted: result.is_ok(),
        });
        result
    }

    /// Write a literal. Formula input is stored as plain text.
    pub fn set_value<A>(&mut self, id: &A, value: impl Into<CellInput>) -> Result<(), WriteError>
    where
        A: Address + ?Sized,
    {
        let literal = match value.into() {
            CellInput::Formula(text) => CellInput::Text(text),
            other => other,
        };
        self.set(id, literal)
    }

    /// Write formula text; the leading `=` is optional.
    pub fn set_formula<A>(&mut self, id: &A, formula: &str) -> Result<(), WriteError>
    where
        A: Address + ?Sized,
    {
        self.set(id, CellInput::formula(formula))
    }

    /// Write user-typed text, classifying it as a formula, number or text.
    pub fn set_input<A>(&mut self, id: &A, input: &str) -> Result<(), WriteError>
    where
        A: Address + ?Sized,
    {
        self.set(id, CellInput::from_input(input))
    }

    fn write(&mut self, cell_ref: &CellRef, input: CellInput) -> Result<(), WriteError> {
        // Old edges go first, even if this write fails.
        self.graph.remove_all_dependencies(cell_ref);

        let formula = match input {
            CellInput::Formula(formula) => formula,
            literal => {
                self.cells
                    .insert(cell_ref.clone(), Cell::new_literal(cell_ref.clone(), literal));
                self.touch();
                self.recalculate_dependents(cell_ref);
                return Ok(());
            }
        };

        if let Err(err) = validate(&formula, &self.bounds) {
            return Err(self.store_rejected(cell_ref, &formula, err.into()));
        }

        let dependencies = self.formula_dependencies(&formula);
        if let Some(path) = self.graph.check_circular_reference(cell_ref, &dependencies) {
            return Err(self.store_rejected(cell_ref, &formula, WriteError::Circular { path }));
        }

        for dependency in &dependencies {
            self.graph.add_dependency(cell_ref, dependency);
        }

        let evaluation = self.evaluate(&formula);
        let outcome = match (&evaluation.error, &evaluation.value) {
            (None, _) => Ok(()),
            (Some(message), CellValue::Error(code)) => Err(WriteError::Evaluation {
                code: *code,
                message: message.clone(),
            }),
            (Some(message), _) => Err(WriteError::Evaluation {
                code: ErrorCode::Error,
                message: message.clone(),
            }),
        };

        self.cells.insert(
            cell_ref.clone(),
            Cell {
                id: cell_ref.clone(),
                raw: CellInput::Formula(formula),
                value: Some(evaluation.value),
                error: evaluation.error,
                dependencies,
            },
        );
        self.touch();
        self.recalculate_dependents(cell_ref);
        outcome
    }

    /// Store a formula that failed before evaluation: text kept, no value, no edges.
    fn store_rejected(&mut self, cell_ref: &CellRef, formula: &str, err: WriteError) -> WriteError {
        self.cells.insert(
            cell_ref.clone(),
            Cell::new_rejected(cell_ref.clone(), formula, err.cell_message()),
        );
        err
    }

    /// Re-evaluate every transitive dependent of `changed`, inputs before readers.
    ///
    /// Dependents are only re-evaluated, never re-validated.
    pub(crate) fn recalculate_dependents(&mut self, changed: &CellRef) {
        for dependent in self.graph.recalc_order(changed) {
            let Some(formula) = self
                .cells
                .get(&dependent)
                .and_then(|c| c.raw.formula_text())
                .map(str::to_string)
            else {
                continue;
            };

            let evaluation = self.evaluate(&formula);
            tracing::trace!(cell = %dependent, value = %evaluation.value, "recalculated");
            if let Some(cell) = self.cells.get_mut(&dependent) {
                cell.value = Some(evaluation.value);
                cell.error = evaluation.error;
            }
        }
    }

    /// Remove a cell. Succeeds for any in-grid address, stored or not.
    pub fn clear_cell<A>(&mut self, id: &A) -> Result<(), WriteError>
    where
        A: Address + ?Sized,
    {
        let cell_ref = id.locate(&self.bounds)?;

        self.graph.remove_all_dependencies(&cell_ref);
        let existed = self.cells.remove(&cell_ref).is_some();
        self.touch();
        self.recalculate_dependents(&cell_ref);

        tracing::debug!(cell = %cell_ref, existed, "cell cleared");
        self.notify(ChangeEvent::CellCleared { cell: cell_ref });
        Ok(())
    }

    /// Drop every cell and every edge.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.graph.clear();
        self.touch();
        tracing::debug!("spreadsheet cleared");
        self.notify(ChangeEvent::Cleared);
    }

    pub fn get<A>(&self, id: &A) -> Option<&Cell>
    where
        A: Address + ?Sized,
    {
        let cell_ref = id.locate(&self.bounds).ok()?;
        self.cells.get(&cell_ref)
    }

    /// The computed value: the literal itself, or the formula's result.
    pub fn get_raw_value<A>(&self, id: &A) -> Option<&CellValue>
    where
        A: Address + ?Sized,
    {
        self.get(id).and_then(|c| c.value.as_ref())
    }

    /// Error message if present, else the stringified value, else empty.
    pub fn get_display_value<A>(&self, id: &A) -> String
    where
        A: Address + ?Sized,
    {
        self.get(id).map(Cell::display_value).unwrap_or_default()
    }

    pub fn get_formula<A>(&self, id: &A) -> Option<&str>
    where
        A: Address + ?Sized,
    {
        self.get(id).and_then(|c| c.raw.formula_text())
    }

    /// Stored cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn stats(&self) -> SheetStats {
        SheetStats {
            total_cells: self.cells.len(),
            formula_cells: self.cells.values().filter(|c| c.raw.is_formula()).count(),
            total_dependency_edges: self.graph.stats().total_edges,
        }
    }
}
