//! Spreadsheet state and logic (UI-agnostic).

mod io;
mod observe;
mod ops;
mod state;

pub use observe::{ChangeEvent, Subscription};
pub use state::{Address, SheetStats, Spreadsheet};
