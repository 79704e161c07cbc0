//! Error types for the cellflow command driver

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a command script
#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Config error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Core(#[from] cellflow_core::CoreError),
}

pub type Result<T> = std::result::Result<T, CliError>;
