//! Cell data structures.
//!
//! - [`CellInput`] - what the user wrote: a number, text, or a formula
//! - [`CellValue`] - what a cell evaluates to, including sentinel errors
//! - [`ErrorCode`] - the sentinel codes (`#NUM!`, `#VALUE!`, ...)
//! - [`Cell`] - a stored cell with its computed state and dependencies

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cell_ref::CellRef;
use super::format::format_number;
use super::parser::{FORMULA_MARKER, formula_body};

/// Sentinel error codes stored in place of a value when evaluation fails.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "#NUM!")]
    Num,
    #[serde(rename = "#VALUE!")]
    Value,
    #[serde(rename = "#REF!")]
    Ref,
    #[serde(rename = "#NAME!")]
    Name,
    #[serde(rename = "#ERROR!")]
    Error,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Num => "#NUM!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME!",
            ErrorCode::Error => "#ERROR!",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed cell value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Number(f64),
    Text(String),
    Error(ErrorCode),
}

impl CellValue {
    /// Numeric view used by aggregates: numbers, and text that parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            CellValue::Error(_) => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Error(code) => write!(f, "{}", code),
        }
    }
}

/// Raw input of a cell: a literal or formula text (including its `=` marker).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellInput {
    Number(f64),
    Text(String),
    Formula(String),
}

impl CellInput {
    /// Formula input; the marker is added when missing.
    pub fn formula(text: &str) -> CellInput {
        let trimmed = text.trim();
        if trimmed.starts_with(FORMULA_MARKER) {
            CellInput::Formula(trimmed.to_string())
        } else {
            CellInput::Formula(format!("{}{}", FORMULA_MARKER, trimmed))
        }
    }

    /// Classify user input.
    /// - Starts with '=' -> Formula
    /// - Valid finite number -> Number
    /// - Otherwise -> Text (kept verbatim)
    pub fn from_input(input: &str) -> CellInput {
        let trimmed = input.trim();
        if formula_body(trimmed).is_some() {
            return CellInput::Formula(trimmed.to_string());
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() && !trimmed.is_empty() => CellInput::Number(n),
            _ => CellInput::Text(input.to_string()),
        }
    }

    pub fn formula_text(&self) -> Option<&str> {
        match self {
            CellInput::Formula(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellInput::Formula(_))
    }

    /// The value a literal stores as-is; None for formulas.
    pub fn literal_value(&self) -> Option<CellValue> {
        match self {
            CellInput::Number(n) => Some(CellValue::Number(*n)),
            CellInput::Text(s) => Some(CellValue::Text(s.clone())),
            CellInput::Formula(_) => None,
        }
    }
}

impl From<f64> for CellInput {
    fn from(n: f64) -> Self {
        CellInput::Number(n)
    }
}

/// Literal text, stored verbatim even if it starts with the marker.
impl From<&str> for CellInput {
    fn from(s: &str) -> Self {
        CellInput::Text(s.to_string())
    }
}

impl From<String> for CellInput {
    fn from(s: String) -> Self {
        CellInput::Text(s)
    }
}

/// A stored cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellRef,
    pub raw: CellInput,
    pub value: Option<CellValue>,
    pub error: Option<String>,
    pub dependencies: Vec<CellRef>,
}

impl Cell {
    /// A literal cell; its value is the literal itself.
    pub fn new_literal(id: CellRef, raw: CellInput) -> Cell {
        Cell {
            id,
            value: raw.literal_value(),
            raw,
            error: None,
            dependencies: vec![],
        }
    }

    /// A formula cell that failed before evaluation: text kept, no value, no dependencies.
    pub fn new_rejected(id: CellRef, formula: &str, error: String) -> Cell {
        Cell {
            id,
            raw: CellInput::Formula(formula.to_string()),
            value: None,
            error: Some(error),
            dependencies: vec![],
        }
    }

    /// Error message if present, else the stringified value, else empty.
    pub fn display_value(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        self.value.as_ref().map(|v| v.to_string()).unwrap_or_default()
    }
}
