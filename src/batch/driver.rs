/// Failure-tolerant, memoized batch driver
///
/// Records are processed strictly one at a time in input order. Each record
/// goes through the operation (via the memo store) and the emit step; the
/// combined outcome is a `Result<Vec<R>>` that never crosses the record
/// boundary. Failed records are logged and skipped, never retried within the
/// same run.
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::progress::{NullProgress, Progress, ProgressState};
use crate::dataset::DatasetRecord;
use crate::error::Result;
use crate::memo::{CallArgs, MemoStore, SessionStats};

/// An expensive external call made once per record
pub trait Operation {
    /// Result payload; must round-trip through the memo store
    type Output: Serialize + DeserializeOwned;

    /// Logical name hashed into every cache key
    fn name(&self) -> &str;

    /// Arguments identifying the call for `record`
    fn call_args(&self, record: &DatasetRecord) -> CallArgs;

    /// Perform the call; only reached on a cache miss
    fn invoke(&self, record: &DatasetRecord) -> Result<Self::Output>;
}

/// `Operation` built from two closures
pub struct FnOperation<A, I> {
    name: String,
    args: A,
    invoke: I,
}

impl<A, I, T> FnOperation<A, I>
where
    A: Fn(&DatasetRecord) -> CallArgs,
    I: Fn(&DatasetRecord) -> Result<T>,
    T: Serialize + DeserializeOwned,
{
    pub fn new(name: impl Into<String>, args: A, invoke: I) -> Self {
        Self {
            name: name.into(),
            args,
            invoke,
        }
    }
}

impl<A, I, T> Operation for FnOperation<A, I>
where
    A: Fn(&DatasetRecord) -> CallArgs,
    I: Fn(&DatasetRecord) -> Result<T>,
    T: Serialize + DeserializeOwned,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn call_args(&self, record: &DatasetRecord) -> CallArgs {
        (self.args)(record)
    }

    fn invoke(&self, record: &DatasetRecord) -> Result<T> {
        (self.invoke)(record)
    }
}

/// One output row, tagged with the record it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow<R> {
    /// Identifier of the originating record
    pub id: String,
    /// Position among the rows emitted for that record
    pub index: usize,
    pub row: R,
}

/// A record that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Zero-based position in the input
    pub position: usize,
    pub id: String,
    pub error: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone)]
pub struct BatchReport<R> {
    pub rows: Vec<ResultRow<R>>,
    pub processed: usize,
    pub succeeded: usize,
    pub failures: Vec<RecordFailure>,
    /// Cache activity during this run only
    pub cache: SessionStats,
    pub elapsed: Duration,
}

impl<R> BatchReport<R> {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Drives one operation over a dataset through a memo store
pub struct BatchDriver<'a> {
    store: &'a MemoStore,
    progress: Box<dyn Progress + 'a>,
}

impl<'a> BatchDriver<'a> {
    pub fn new(store: &'a MemoStore) -> Self {
        Self {
            store,
            progress: Box::new(NullProgress),
        }
    }

    pub fn with_progress(mut self, progress: impl Progress + 'a) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Run `operation` over `records`, flattening each result through `emit`
    ///
    /// Rows keep input-record order; rows of one record keep `emit` order.
    /// Transport, inference and extraction failures skip the record; any other
    /// failure (the store became unusable) ends the run with that error.
    pub fn run<O, R, F>(
        &mut self,
        records: &[DatasetRecord],
        operation: &O,
        mut emit: F,
    ) -> Result<BatchReport<R>>
    where
        O: Operation,
        F: FnMut(&O::Output) -> Result<Vec<R>>,
    {
        let cache_before = self.store.session_stats();
        let mut state = ProgressState::new(records.len());
        let mut rows = Vec::new();
        let mut failures = Vec::new();
        let mut succeeded = 0;

        self.progress.begin(records.len());

        for (position, record) in records.iter().enumerate() {
            match self.process_record(record, operation, &mut emit) {
                Ok(emitted) => {
                    debug!(
                        position,
                        record = %record.id,
                        row_count = emitted.len(),
                        "record processed"
                    );
                    rows.extend(emitted.into_iter().enumerate().map(|(index, row)| ResultRow {
                        id: record.id.clone(),
                        index,
                        row,
                    }));
                    succeeded += 1;
                    state.advance();
                    self.progress.record_done(&state, &record.id, true);
                }
                Err(e) if !e.is_record_scoped() => {
                    // Without a working store every further call would be paid for and lost
                    error!(
                        position,
                        record = %record.id,
                        error = %e,
                        "cache unusable, aborting run at record {}",
                        position
                    );
                    self.progress.finish(&state);
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        position,
                        record = %record.id,
                        error = %e,
                        "Issue with record {}",
                        position
                    );
                    failures.push(RecordFailure {
                        position,
                        id: record.id.clone(),
                        error: e.to_string(),
                    });
                    state.advance();
                    self.progress.record_done(&state, &record.id, false);
                }
            }
        }

        self.progress.finish(&state);

        Ok(BatchReport {
            rows,
            processed: state.processed(),
            succeeded,
            failures,
            cache: self.store.session_stats().since(&cache_before),
            elapsed: state.elapsed(),
        })
    }

    /// Operation plus emit for a single record
    fn process_record<O, R, F>(
        &self,
        record: &DatasetRecord,
        operation: &O,
        emit: &mut F,
    ) -> Result<Vec<R>>
    where
        O: Operation,
        F: FnMut(&O::Output) -> Result<Vec<R>>,
    {
        let args = operation.call_args(record);
        let output = self
            .store
            .get_or_compute(operation.name(), &args, || operation.invoke(record))?;
        emit(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn records(items: &[(&str, &str)]) -> Vec<DatasetRecord> {
        items
            .iter()
            .map(|(id, payload)| DatasetRecord::new(*id, *payload))
            .collect()
    }

    fn text_args(record: &DatasetRecord) -> CallArgs {
        CallArgs::new().named("account", record.payload.as_str())
    }

    #[test]
    fn test_fan_out_keeps_id_and_order() {
        let temp = TempDir::new().unwrap();
        let store = MemoStore::open(temp.path()).unwrap();
        let op = FnOperation::new("extract", text_args, |_: &DatasetRecord| {
            Ok(vec!["hero".to_string(), "shadow".to_string(), "child".to_string()])
        });

        let report = BatchDriver::new(&store)
            .run(
                &records(&[("42", "a trip")]),
                &op,
                |labels: &Vec<String>| Ok(labels.clone()),
            )
            .unwrap();

        assert_eq!(report.rows.len(), 3);
        assert!(report.rows.iter().all(|r| r.id == "42"));
        let labels: Vec<&str> = report.rows.iter().map(|r| r.row.as_str()).collect();
        assert_eq!(labels, vec!["hero", "shadow", "child"]);
        let indices: Vec<usize> = report.rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_record_is_isolated() {
        let temp = TempDir::new().unwrap();
        let store = MemoStore::open(temp.path()).unwrap();
        let calls = Cell::new(0);
        let op = FnOperation::new("extract", text_args, |record: &DatasetRecord| {
            calls.set(calls.get() + 1);
            if record.id == "3" {
                Err(Error::Transport {
                    url: "https://example.com/3".to_string(),
                    message: "connection reset".to_string(),
                })
            } else {
                Ok(record.payload.clone())
            }
        });

        let input = records(&[("1", "a"), ("2", "b"), ("3", "c"), ("4", "d"), ("5", "e")]);
        let report = BatchDriver::new(&store)
            .run(&input, &op, |s: &String| Ok(vec![s.clone()]))
            .unwrap();

        assert_eq!(calls.get(), 5);
        assert_eq!(report.processed, 5);
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].position, 2);
        assert_eq!(report.failures[0].id, "3");
        assert!(report.failures[0].error.contains("connection reset"));

        let ids: Vec<&str> = report.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4", "5"]);
    }

    #[test]
    fn test_emit_failure_counts_as_record_failure() {
        let temp = TempDir::new().unwrap();
        let store = MemoStore::open(temp.path()).unwrap();
        let op = FnOperation::new("summarize", text_args, |record: &DatasetRecord| {
            Ok(record.payload.clone())
        });

        let report = BatchDriver::new(&store)
            .run(&records(&[("1", "fine"), ("2", "")]), &op, |s: &String| {
                if s.is_empty() {
                    Err(Error::Extract("empty summary".to_string()))
                } else {
                    Ok(vec![s.clone()])
                }
            })
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.rows.len(), 1);
        // The operation itself succeeded, so its result is cached
        assert_eq!(report.cache.misses, 2);
        assert_eq!(store.stats().unwrap().total_entries, 2);
    }

    #[test]
    fn test_store_failure_aborts_run() {
        let temp = TempDir::new().unwrap();
        let store_dir = temp.path().join("store");
        let store = MemoStore::open(&store_dir).unwrap();
        fs::remove_dir_all(&store_dir).unwrap();

        let calls = Cell::new(0);
        let op = FnOperation::new("extract", text_args, |record: &DatasetRecord| {
            calls.set(calls.get() + 1);
            Ok(record.payload.clone())
        });

        let err = BatchDriver::new(&store)
            .run(
                &records(&[("1", "a"), ("2", "b"), ("3", "c")]),
                &op,
                |s: &String| Ok(vec![s.clone()]),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_progress_observer_sees_every_record() {
        #[derive(Default)]
        struct Recorder {
            total: usize,
            seen: Vec<(usize, String, bool)>,
            finished: bool,
        }

        impl Progress for &mut Recorder {
            fn begin(&mut self, total: usize) {
                self.total = total;
            }
            fn record_done(&mut self, state: &ProgressState, id: &str, ok: bool) {
                self.seen.push((state.processed(), id.to_string(), ok));
            }
            fn finish(&mut self, _state: &ProgressState) {
                self.finished = true;
            }
        }

        let temp = TempDir::new().unwrap();
        let store = MemoStore::open(temp.path()).unwrap();
        let op = FnOperation::new("op", text_args, |record: &DatasetRecord| {
            if record.id == "b" {
                Err(Error::Inference("malformed".to_string()))
            } else {
                Ok(1u32)
            }
        });

        let mut recorder = Recorder::default();
        BatchDriver::new(&store)
            .with_progress(&mut recorder)
            .run(&records(&[("a", "1"), ("b", "2")]), &op, |_: &u32| {
                Ok(Vec::<()>::new())
            })
            .unwrap();

        assert_eq!(recorder.total, 2);
        assert_eq!(
            recorder.seen,
            vec![(1, "a".to_string(), true), (2, "b".to_string(), false)]
        );
        assert!(recorder.finished);
    }

    #[test]
    fn test_empty_input() {
        let temp = TempDir::new().unwrap();
        let store = MemoStore::open(temp.path()).unwrap();
        let op = FnOperation::new("op", text_args, |_: &DatasetRecord| Ok(0u8));

        let report = BatchDriver::new(&store)
            .run(&[], &op, |_: &u8| Ok(vec![()]))
            .unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(report.succeeded, 0);
        assert!(report.rows.is_empty());
    }
}
