//! Dependency extraction from formula strings.
//!
//! Scans formula text for every cell identifier it reads (e.g. `A1`, `B2`)
//! and expands range notation (`A1:A5`) into its member identifiers. The
//! result feeds validation, cycle detection and the dependency graph.
//!
//! Identifiers are returned as upper-cased names, not [`CellRef`]s, because an
//! out-of-range name such as `A0` or `K1` must still be reported so the
//! caller can reject it.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::cell_ref::CellRef;

/// Vertical spans longer than this keep only their endpoints; at least one
/// endpoint is then outside any grid, so validation still rejects the formula.
/// Horizontal spans are bounded by the single-letter columns.
const MAX_RANGE_CELLS: u64 = 4096;

/// Extract all cell identifiers referenced by `text`, in first-occurrence order
/// with duplicates collapsed.
pub fn extract_references(text: &str) -> Vec<String> {
    let text = text.to_ascii_uppercase();
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for caps in reference_re().captures_iter(&text) {
        let names = match caps.get(2) {
            Some(end) => expand_range(&caps[1], end.as_str()),
            None => vec![caps[1].to_string()],
        };
        for name in names {
            if seen.insert(name.clone()) {
                refs.push(name);
            }
        }
    }

    refs
}

/// Expand `start:end` into member identifiers.
///
/// Same column expands vertically, same row horizontally, both inclusive and
/// direction-independent. Any other shape expands to nothing.
pub fn expand_range(start: &str, end: &str) -> Vec<String> {
    let (Some((start_col, start_row)), Some((end_col, end_row))) =
        (split_name(start), split_name(end))
    else {
        return Vec::new();
    };

    if start_col == end_col {
        let (lo, hi) = (start_row.min(end_row), start_row.max(end_row));
        if hi - lo >= MAX_RANGE_CELLS {
            return endpoints(start, end);
        }
        (lo..=hi).map(|row| format!("{}{}", start_col, row)).collect()
    } else if start_row == end_row {
        let (lo, hi) = (start_col.min(end_col), start_col.max(end_col));
        (lo..=hi).map(|col| format!("{}{}", col, start_row)).collect()
    } else {
        Vec::new()
    }
}

fn endpoints(start: &str, end: &str) -> Vec<String> {
    let mut names = vec![start.to_ascii_uppercase()];
    if !start.eq_ignore_ascii_case(end) {
        names.push(end.to_ascii_uppercase());
    }
    names
}

/// Lenient split into (column letter, row number as written). Accepts row 0 so
/// that out-of-range ranges still produce reportable names.
fn split_name(name: &str) -> Option<(char, u64)> {
    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !letter.is_ascii_uppercase() {
        return None;
    }
    let row = chars.as_str().parse::<u64>().ok()?;
    Some((letter, row))
}

/// Parse a cell range like "A1:A5" into its two endpoints.
pub fn parse_range(range: &str) -> Option<(CellRef, CellRef)> {
    let (start, end) = range.split_once(':')?;
    let start = CellRef::from_str(start)?;
    let end = CellRef::from_str(end)?;
    Some((start, end))
}

/// Matches a bare identifier (group 1), optionally followed by `:ID` (group 2).
fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][0-9]+)(?:\s*:\s*([A-Z][0-9]+))?\b")
            .expect("dependency reference regex must compile")
    })
}
