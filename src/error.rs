//! Error taxonomy shared by the cache, the batch driver and the external
//! collaborators.
//!
//! Storage and dataset failures are fatal for a run. Transport, inference and
//! extraction failures are scoped to a single record and are recovered by the
//! driver.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache path exists but is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Cache entry {key} could not be decoded: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Dataset {path}: {source}")]
    Dataset {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset {path} has no column named '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Could not extract rows: {0}")]
    Extract(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures that only affect the record being processed.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Inference(_) | Error::Extract(_)
        )
    }
}
