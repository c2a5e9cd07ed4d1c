//! Sequential batch processing over a memo store
//!
//! - `driver`: per-record operation + emit, failure isolation, fan-out
//! - `progress`: processed/total counters, ETA and progress observers

pub mod driver;
pub mod progress;

pub use driver::{BatchDriver, BatchReport, FnOperation, Operation, RecordFailure, ResultRow};
pub use progress::{format_hms, LogProgress, NullProgress, Progress, ProgressState};
