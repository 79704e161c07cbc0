//! Line-oriented command scripts.
//!
//! ```text
//! # comment
//! set A1 10
//! set B1 =A1*2
//! get B1
//! show
//! ```

use std::io::Write;
use std::path::PathBuf;

use crate::error::{CliError, Result};
use cellflow_core::Spreadsheet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write user input; classified as formula, number or text.
    Set { id: String, input: String },
    Clear { id: String },
    Reset,
    Get { id: String },
    Show,
    Stats,
    Export { path: PathBuf },
    Import { path: PathBuf },
}

/// Parse one script line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<Command>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (trimmed, ""),
    };
    let parse_error = |message: String| CliError::Parse {
        line: line_no,
        message,
    };
    let single = |what: &str| -> Result<String> {
        match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [one] => Ok(one.to_string()),
            _ => Err(parse_error(format!("{} expects exactly one {}", word, what))),
        }
    };
    let none = || -> Result<()> {
        if rest.is_empty() {
            Ok(())
        } else {
            Err(parse_error(format!("{} takes no arguments", word)))
        }
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "set" => {
            let Some((id, input)) = rest.split_once(char::is_whitespace) else {
                return Err(parse_error("set expects a cell and an input".to_string()));
            };
            Command::Set {
                id: id.to_string(),
                input: input.trim().to_string(),
            }
        }
        "clear" => Command::Clear { id: single("cell")? },
        "reset" => {
            none()?;
            Command::Reset
        }
        "get" => Command::Get { id: single("cell")? },
        "show" => {
            none()?;
            Command::Show
        }
        "stats" => {
            none()?;
            Command::Stats
        }
        "export" => Command::Export {
            path: PathBuf::from(single("file")?),
        },
        "import" => Command::Import {
            path: PathBuf::from(single("file")?),
        },
        other => return Err(parse_error(format!("unknown command: {}", other))),
    };
    Ok(Some(command))
}

/// Run one command. Returns false if the command was rejected.
///
/// Only failures writing to `out` are returned as errors.
pub fn execute<W: Write>(sheet: &mut Spreadsheet, command: &Command, out: &mut W) -> Result<bool> {
    match command {
        Command::Set { id, input } => {
            if let Err(err) = sheet.set_input(id.as_str(), input) {
                writeln!(out, "!{}: {}", id, err)?;
                return Ok(false);
            }
        }
        Command::Clear { id } => {
            if let Err(err) = sheet.clear_cell(id.as_str()) {
                writeln!(out, "!{}: {}", id, err)?;
                return Ok(false);
            }
        }
        Command::Reset => sheet.clear(),
        Command::Get { id } => {
            if !sheet.bounds().is_valid_reference(id) {
                writeln!(out, "!{}: Invalid cell address: {}", id, id)?;
                return Ok(false);
            }
            writeln!(out, "{}", sheet.get_display_value(id.as_str()))?;
        }
        Command::Show => {
            for cell in sheet.cells() {
                match cell.raw.formula_text() {
                    Some(formula) => writeln!(out, "{}: {} ({})", cell.id, cell.display_value(), formula)?,
                    None => writeln!(out, "{}: {}", cell.id, cell.display_value())?,
                }
            }
        }
        Command::Stats => {
            let stats = sheet.stats();
            writeln!(
                out,
                "cells: {}, formulas: {}, edges: {}",
                stats.total_cells, stats.formula_cells, stats.total_dependency_edges
            )?;
        }
        Command::Export { path } => {
            if let Err(err) = sheet.save_snapshot(path) {
                writeln!(out, "!export: {}", err)?;
                return Ok(false);
            }
        }
        Command::Import { path } => {
            if let Err(err) = sheet.load_snapshot(path) {
                writeln!(out, "!import: {}", err)?;
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Run every line of `script`, continuing past failures.
/// Returns the number of lines that failed to parse or were rejected.
pub fn run_script<W: Write>(sheet: &mut Spreadsheet, script: &str, out: &mut W) -> Result<usize> {
    let mut failures = 0;
    for (idx, line) in script.lines().enumerate() {
        let command = match parse_line(line, idx + 1) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                tracing::debug!(error = %err, "skipping line");
                eprintln!("Error: {}", err);
                failures += 1;
                continue;
            }
        };
        if !execute(sheet, &command, out)? {
            failures += 1;
        }
    }
    Ok(failures)
}
