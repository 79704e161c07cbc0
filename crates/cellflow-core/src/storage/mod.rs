//! Persisted formats.

mod snapshot;

pub use snapshot::{Snapshot, parse_snapshot, read_snapshot, write_snapshot, write_snapshot_content};
