//! Spreadsheet engine API.
//!
//! This module provides the leaf components of the calculation engine:
//!
//! - [`Cell`], [`CellInput`], [`CellValue`], [`ErrorCode`] - Cell data
//! - [`CellRef`], [`GridBounds`] - A1 addresses and the fixed address space
//! - [`extract_references`] - Find the cells a formula reads
//! - [`parse`], [`validate`] - Tokenize and structurally check formulas
//! - [`evaluate`] - Compute a formula against current cell values
//! - [`DependencyGraph`] - Dependency/dependent edges, cycle checks, propagation order

mod arith;
mod cell;
mod cell_ref;
mod cycle;
mod deps;
mod eval;
mod format;
mod graph;
mod parser;

pub use arith::{ArithError, evaluate_tokens};
pub use cell::{Cell, CellInput, CellValue, ErrorCode};
pub use cell_ref::{CellRef, GridBounds, MAX_COLUMNS};
pub use deps::{expand_range, extract_references, parse_range};
pub use eval::{Evaluation, ValueSource, evaluate};
pub use format::{format_number, round_result};
pub use graph::{DependencyGraph, GraphStats};
pub use parser::{
    FORMULA_MARKER, FormulaError, ParsedFormula, Token, formula_body, is_formula, parse, tokenize,
    validate,
};
