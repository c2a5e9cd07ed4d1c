//! Tabular dataset input and output
//!
//! Inputs are CSV files with a header row; two named columns supply each
//! record's identifier and payload. Outputs are rewritten in full at the end of
//! a run: the identifier column, an optional per-record row index, then the
//! row's own columns.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

use crate::batch::ResultRow;
use crate::error::{Error, Result};

/// One input row: a stable identifier and the payload handed to the operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: String,
    pub payload: String,
}

impl DatasetRecord {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// A row type that can be written as CSV columns
pub trait Tabular {
    /// Column names, excluding the identifier and index columns
    fn columns() -> Vec<&'static str>;

    /// Cell values, in `columns()` order
    fn cells(&self) -> Vec<String>;
}

/// Read `(id_column, payload_column)` pairs from a CSV file
pub fn read_records(
    path: &Path,
    id_column: &str,
    payload_column: &str,
) -> Result<Vec<DatasetRecord>> {
    let dataset_err = |source| Error::Dataset {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(dataset_err)?;

    let headers = reader.headers().map_err(dataset_err)?.clone();
    let column_index = |column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| Error::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };
    let id_index = column_index(id_column)?;
    let payload_index = column_index(payload_column)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(dataset_err)?;
        records.push(DatasetRecord {
            id: row.get(id_index).unwrap_or_default().to_string(),
            payload: row.get(payload_index).unwrap_or_default().to_string(),
        });
    }

    info!(
        path = %path.display(),
        entry_count = records.len(),
        "dataset loaded"
    );

    Ok(records)
}

/// Write result rows to `path`, replacing any existing file
///
/// The file is assembled next to its destination and renamed into place, so a
/// failed export never leaves a truncated file behind.
pub fn write_rows<R: Tabular>(
    path: &Path,
    id_column: &str,
    rows: &[ResultRow<R>],
    with_index: bool,
) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let dataset_err = |source| Error::Dataset {
        path: path.to_path_buf(),
        source,
    };

    let temp = tempfile::Builder::new()
        .prefix(".export-")
        .tempfile_in(parent)
        .map_err(|e| Error::io(parent, e))?;

    let mut writer = csv::Writer::from_writer(temp);

    let mut header = vec![id_column];
    if with_index {
        header.push("index");
    }
    header.extend(R::columns());
    writer.write_record(&header).map_err(dataset_err)?;

    for row in rows {
        let mut record = vec![row.id.clone()];
        if with_index {
            record.push(row.index.to_string());
        }
        record.extend(row.row.cells());
        writer.write_record(&record).map_err(dataset_err)?;
    }

    writer.flush().map_err(|e| Error::io(path, e))?;
    let mut temp = writer
        .into_inner()
        .map_err(|e| Error::io(path, io::Error::new(e.error().kind(), e.error().to_string())))?;
    temp.flush().map_err(|e| Error::io(path, e))?;
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;

    info!(
        path = %path.display(),
        entry_count = rows.len(),
        "dataset written"
    );

    Ok(())
}
