use std::collections::BTreeMap;
use std::path::Path;

use cellflow_engine::engine::{Cell, DependencyGraph, validate};

use super::Spreadsheet;
use super::observe::ChangeEvent;
use crate::error::{CoreError, Result, WriteError};
use crate::storage::{Snapshot, read_snapshot, write_snapshot};

impl Spreadsheet {
    /// Structural copy of every stored cell plus version metadata.
    pub fn export_data(&self) -> Snapshot {
        Snapshot {
            cells: self.cells.clone(),
            version: self.version,
            last_modified: self.last_modified,
        }
    }

    /// Replace the whole sheet with `snapshot`.
    ///
    /// The dependency graph is rebuilt from each formula's text; the
    /// dependency lists carried by the snapshot are ignored. Formulas that
    /// would close a cycle are stored with the circular-reference error and
    /// no edges. Nothing changes if the snapshot names a cell outside the grid.
    pub fn import_data(&mut self, snapshot: Snapshot) -> Result<()> {
        for (key, cell) in &snapshot.cells {
            if !self.bounds.contains(key) {
                return Err(CoreError::InvalidSnapshot(format!(
                    "cell {} is outside the {}x{} grid",
                    key, self.bounds.columns, self.bounds.rows
                )));
            }
            if *key != cell.id {
                return Err(CoreError::InvalidSnapshot(format!(
                    "cell stored under {} claims to be {}",
                    key, cell.id
                )));
            }
        }

        let mut graph = DependencyGraph::new();
        let mut cells: BTreeMap<_, Cell> = BTreeMap::new();

        // Row-major replay: when two formulas form a cycle, the later one is marked.
        for (key, mut cell) in snapshot.cells {
            if let Some(formula) = cell.raw.formula_text().map(str::to_string) {
                cell.dependencies = Vec::new();

                if let Err(err) = validate(&formula, &self.bounds) {
                    cell.value = None;
                    cell.error = Some(WriteError::from(err).cell_message());
                } else {
                    let dependencies = self.formula_dependencies(&formula);
                    match graph.check_circular_reference(&key, &dependencies) {
                        Some(path) => {
                            let err = WriteError::Circular { path };
                            tracing::warn!(cell = %key, error = %err, "cycle in imported snapshot");
                            cell.value = None;
                            cell.error = Some(err.cell_message());
                        }
                        None => {
                            for dependency in &dependencies {
                                graph.add_dependency(&key, dependency);
                            }
                            cell.dependencies = dependencies;
                        }
                    }
                }
            } else {
                cell.dependencies = Vec::new();
                cell.value = cell.raw.literal_value();
                cell.error = None;
            }
            cells.insert(key, cell);
        }

        let count = cells.len();
        self.cells = cells;
        self.graph = graph;
        self.version = snapshot.version;
        self.last_modified = snapshot.last_modified;

        tracing::debug!(cells = count, version = self.version, "snapshot imported");
        self.notify(ChangeEvent::Imported { cells: count });
        Ok(())
    }

    /// Write the current snapshot to `path` as JSON.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        write_snapshot(path, &self.export_data())
    }

    /// Replace the sheet with the snapshot stored at `path`.
    pub fn load_snapshot(&mut self, path: &Path) -> Result<()> {
        let snapshot = read_snapshot(path)?;
        self.import_data(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellflow_engine::engine::{CellInput, CellRef, CellValue, GridBounds};

    fn cell(name: &str) -> CellRef {
        CellRef::from_str(name).unwrap()
    }

    fn formula_cell(name: &str, formula: &str, value: f64) -> Cell {
        Cell {
            id: cell(name),
            raw: CellInput::Formula(formula.into()),
            value: Some(CellValue::Number(value)),
            error: None,
            dependencies: vec![],
        }
    }

    fn snapshot_of(cells: Vec<Cell>) -> Snapshot {
        Snapshot {
            cells: cells.into_iter().map(|c| (c.id.clone(), c)).collect(),
            version: 7,
            last_modified: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_export_import_is_idempotent() {
        let mut sheet = Spreadsheet::new();
        sheet.set("A1", 10.0).unwrap();
        sheet.set_formula("B1", "=A1*2").unwrap();
        sheet.set_formula("C1", "=SUM(A1:B1)").unwrap();
        let exported = sheet.export_data();

        let mut copy = Spreadsheet::new();
        copy.import_data(exported.clone()).unwrap();
        assert_eq!(copy.export_data(), exported);
        assert_eq!(copy.graph().stats(), sheet.graph().stats());
    }

    #[test]
    fn test_import_ignores_transmitted_dependencies() {
        let mut stale = formula_cell("B1", "=A1+A2", 0.0);
        stale.dependencies = vec![cell("J5")];

        let mut sheet = Spreadsheet::new();
        sheet.import_data(snapshot_of(vec![stale])).unwrap();
        assert_eq!(sheet.get("B1").unwrap().dependencies, vec![cell("A1"), cell("A2")]);
        assert_eq!(sheet.graph().dependents(&cell("A2")), &[cell("B1")]);
        assert!(sheet.graph().dependents(&cell("J5")).is_empty());
    }

    #[test]
    fn test_import_marks_cycles() {
        let mut sheet = Spreadsheet::new();
        sheet
            .import_data(snapshot_of(vec![
                formula_cell("A1", "=B1", 0.0),
                formula_cell("B1", "=A1", 0.0),
            ]))
            .unwrap();

        assert_eq!(sheet.graph().stats().total_edges, 1);
        let b1 = sheet.get("B1").unwrap();
        assert_eq!(b1.value, None);
        assert_eq!(
            b1.error.as_deref(),
            Some("Circular reference: B1 -> A1 -> B1")
        );
        assert!(b1.dependencies.is_empty());
    }

    #[test]
    fn test_import_outside_grid_changes_nothing() {
        let mut sheet = Spreadsheet::new();
        sheet.set("A1", 1.0).unwrap();

        let mut bounds_sheet = Spreadsheet::with_bounds(GridBounds::new(26, 50));
        bounds_sheet.set("Z50", 1.0).unwrap();
        let err = sheet.import_data(bounds_sheet.export_data()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSnapshot(_)));
        assert_eq!(sheet.get_raw_value("A1"), Some(&CellValue::Number(1.0)));
    }

    #[test]
    fn test_import_then_write_propagates() {
        let mut sheet = Spreadsheet::new();
        sheet
            .import_data(snapshot_of(vec![
                Cell::new_literal(cell("A1"), CellInput::Number(1.0)),
                formula_cell("A2", "=A1+1", 2.0),
            ]))
            .unwrap();
        assert_eq!(sheet.version(), 7);

        sheet.set("A1", 5.0).unwrap();
        assert_eq!(sheet.get_raw_value("A2"), Some(&CellValue::Number(6.0)));
    }

    #[test]
    fn test_import_notifies() {
        let mut sheet = Spreadsheet::new();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let sink = seen.clone();
        let _sub = sheet.on_change(move |event| *sink.borrow_mut() = Some(event.clone()));
        sheet
            .import_data(snapshot_of(vec![formula_cell("A1", "=1", 1.0)]))
            .unwrap();
        assert_eq!(*seen.borrow(), Some(ChangeEvent::Imported { cells: 1 }));
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");

        let mut sheet = Spreadsheet::new();
        sheet.set("A1", 4.0).unwrap();
        sheet.set_formula("B1", "=A1/2").unwrap();
        sheet.save_snapshot(&path).unwrap();

        let mut loaded = Spreadsheet::new();
        loaded.load_snapshot(&path).unwrap();
        assert_eq!(loaded.get_display_value("B1"), "2");
        assert_eq!(loaded.get_formula("B1"), Some("=A1/2"));
    }

    #[test]
    fn test_snapshot_loads_after_rejected_non_finite_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");

        let mut sheet = Spreadsheet::new();
        sheet.set("A1", 3.0).unwrap();
        assert!(sheet.set("A1", f64::NAN).is_err());
        assert!(sheet.set("A2", f64::INFINITY).is_err());
        sheet.save_snapshot(&path).unwrap();

        let mut loaded = Spreadsheet::new();
        loaded.load_snapshot(&path).unwrap();
        assert_eq!(loaded.get_raw_value("A1"), Some(&CellValue::Number(3.0)));
        assert_eq!(loaded.cells().count(), 1);
        assert_eq!(loaded.get("A2"), None);
    }
}
