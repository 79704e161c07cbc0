//! JSON snapshot format.
//!
//! ```json
//! {
//!   "cells": {
//!     "A1": { "id": "A1", "raw": { "type": "number", "value": 10.0 }, ... }
//!   },
//!   "version": 3,
//!   "lastModified": "2024-01-01T00:00:00Z"
//! }
//! ```
//!
//! The dependency graph is never written; it is rebuilt on import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{CoreError, Result};
use cellflow_engine::engine::{Cell, CellRef};

const MAX_SNAPSHOT_BYTES: u64 = 16 * 1_048_576; // 16 MiB

/// Every stored cell plus version metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub cells: BTreeMap<CellRef, Cell>,
    pub version: u64,
    pub last_modified: DateTime<Utc>,
}

/// Write a snapshot to a JSON file.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let content = write_snapshot_content(snapshot)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn write_snapshot_content(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)? + "\n")
}

/// Read a snapshot from a JSON file.
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let meta = fs::metadata(path)?;
    if meta.len() > MAX_SNAPSHOT_BYTES {
        return Err(CoreError::InvalidSnapshot(format!(
            "refusing to read {}: file too large ({} bytes, max {})",
            path.display(),
            meta.len(),
            MAX_SNAPSHOT_BYTES
        )));
    }
    parse_snapshot(&fs::read_to_string(path)?)
}

pub fn parse_snapshot(content: &str) -> Result<Snapshot> {
    Ok(serde_json::from_str(content)?)
}
