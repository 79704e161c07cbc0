//! cellflow-core - UI-agnostic reactive spreadsheet + snapshot storage.

pub mod document;
pub mod error;
pub mod storage;

pub use document::{Address, ChangeEvent, SheetStats, Spreadsheet, Subscription};
pub use error::{CoreError, Result, WriteError};
pub use storage::Snapshot;

pub use cellflow_engine::engine::{Cell, CellInput, CellRef, CellValue, ErrorCode, GridBounds};
