// Library interface for Memobatch
// The binary and the integration tests both go through these modules

pub mod batch;
pub mod cli;
pub mod cli_utils;
pub mod commands;
pub mod config;
pub mod config_discovery;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod memo;
pub mod pipelines;
pub mod remote;

// Re-export commonly used types
pub use batch::{BatchDriver, BatchReport, FnOperation, Operation, Progress, ResultRow};
pub use config::MemobatchConfig;
pub use config_discovery::{discover_config, load_config_with_discovery};
pub use dataset::{read_records, write_rows, DatasetRecord, Tabular};
pub use error::{Error, Result};
pub use memo::{clear_store, derive_key, ensure_store, Arg, CacheKey, CallArgs, MemoStore};
