/// Progress and ETA tracking for a batch run
///
/// State is process-local and recomputed from scratch on every run.
use std::time::{Duration, Instant};
use tracing::info;

/// Counters and timing for one run
#[derive(Debug, Clone)]
pub struct ProgressState {
    total: usize,
    processed: usize,
    started: Instant,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            started: Instant::now(),
        }
    }

    /// Count one more record as processed, whatever its outcome
    pub fn advance(&mut self) {
        self.processed = (self.processed + 1).min(self.total);
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn remaining(&self) -> usize {
        self.total - self.processed
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Percentage of records processed (100 for an empty batch)
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }

    /// Estimated time remaining given the time spent so far
    ///
    /// `elapsed / processed * (total - processed)`; `None` before the first
    /// record completes.
    pub fn eta_after(&self, elapsed: Duration) -> Option<Duration> {
        if self.processed == 0 {
            return None;
        }
        let per_record = elapsed.as_secs_f64() / self.processed as f64;
        Some(Duration::from_secs_f64(per_record * self.remaining() as f64))
    }

    pub fn eta(&self) -> Option<Duration> {
        self.eta_after(self.elapsed())
    }

    /// One-line human summary, e.g. `2/3 (66.67%) | ETA 0:00:04`
    pub fn line(&self) -> String {
        let eta = self
            .eta()
            .map(format_hms)
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "{}/{} ({:.2}%) | ETA {}",
            self.processed,
            self.total,
            self.percent(),
            eta
        )
    }
}

/// Format a duration as `H:MM:SS`, truncating sub-second precision
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Observer of a batch run
///
/// Frontends implement this to surface status; every method defaults to a
/// no-op.
pub trait Progress {
    /// Called once before the first record
    fn begin(&mut self, _total: usize) {}

    /// Called after each record, successful or not
    fn record_done(&mut self, _state: &ProgressState, _id: &str, _ok: bool) {}

    /// Called once after the last record
    fn finish(&mut self, _state: &ProgressState) {}
}

/// A no-op progress sink
pub struct NullProgress;
impl Progress for NullProgress {}

/// Emits one `info` line per record
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Progress for LogProgress {
    fn begin(&mut self, total: usize) {
        info!(batch = %self.label, total, "starting batch");
    }

    fn record_done(&mut self, state: &ProgressState, id: &str, ok: bool) {
        info!(
            batch = %self.label,
            record = id,
            ok,
            "Progress: {}",
            state.line()
        );
    }

    fn finish(&mut self, state: &ProgressState) {
        info!(
            batch = %self.label,
            processed = state.processed(),
            elapsed = %format_hms(state.elapsed()),
            "batch finished"
        );
    }
}
