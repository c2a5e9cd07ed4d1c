/// CLI utilities for consistent output formatting
use std::io::IsTerminal;

use crate::batch::BatchReport;
use crate::batch::format_hms;

/// Get a colored prefix
///
/// Returns bright cyan if stderr is a TTY, plain text otherwise.
pub fn memobatch_prefix() -> &'static str {
    if std::io::stderr().is_terminal() {
        "\x1b[96m[memobatch]\x1b[0m"
    } else {
        "[memobatch]"
    }
}

/// One-line run summary
pub fn summary_line<R>(report: &BatchReport<R>) -> String {
    format!(
        "processed {} | succeeded {} | failed {} | rows {} | cache hits {} misses {} recovered {} | elapsed {}",
        report.processed,
        report.succeeded,
        report.failed(),
        report.rows.len(),
        report.cache.hits,
        report.cache.misses,
        report.cache.recovered,
        format_hms(report.elapsed)
    )
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes_f = bytes as f64;
    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{} B", bytes)
    }
}
