//! Error types for Cellflow core.

use thiserror::Error;

use cellflow_engine::engine::{CellRef, ErrorCode, FormulaError};

/// Why a write was rejected. Every variant except `InvalidAddress` and
/// `NotFinite` leaves the cell stored with its error visible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Number is not finite: {0}")]
    NotFinite(f64),

    #[error("Syntax error: {0}")]
    Syntax(FormulaError),

    #[error("Invalid cell reference: {0}")]
    Reference(String),

    #[error("Circular reference: {}", format_path(.path))]
    Circular { path: Vec<CellRef> },

    #[error("{code}: {message}")]
    Evaluation { code: ErrorCode, message: String },
}

impl WriteError {
    /// Message stored on the cell for display.
    pub fn cell_message(&self) -> String {
        match self {
            WriteError::Evaluation { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<FormulaError> for WriteError {
    fn from(err: FormulaError) -> Self {
        match err {
            FormulaError::InvalidReference(name) => WriteError::Reference(name),
            other => WriteError::Syntax(other),
        }
    }
}

fn format_path(path: &[CellRef]) -> String {
    path.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors from snapshot persistence.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
