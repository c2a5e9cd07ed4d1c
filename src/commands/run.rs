/// Batch commands: `summarize`, `archetypes`, `fetch`
///
/// Each one loads the dataset, drives its operation through the operation's
/// own memo store and writes the collected rows.
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::batch::{BatchDriver, LogProgress, Operation};
use crate::cli::{ArchetypesArgs, BatchArgs, FetchArgs, SummarizeArgs};
use crate::cli_utils::{memobatch_prefix, summary_line};
use crate::config::MemobatchConfig;
use crate::dataset::{read_records, write_rows, Tabular};
use crate::error;
use crate::memo::{clear_store, MemoStore};
use crate::pipelines::{
    emit_archetypes, emit_page, emit_summary, ExtractArchetypes, FetchPage, Summarize,
};
use crate::remote::{HttpFetcher, OpenAiChatClient};

pub fn summarize(config: &MemobatchConfig, args: &SummarizeArgs) -> Result<()> {
    let model = OpenAiChatClient::new(&config.llm).context("Failed to build model client")?;
    let operation = Summarize::new(&model);

    run_batch(
        config,
        &args.batch,
        Columns {
            id: &args.id_column,
            payload: &args.text_column,
            with_index: false,
        },
        &operation,
        emit_summary,
    )
}

pub fn archetypes(config: &MemobatchConfig, args: &ArchetypesArgs) -> Result<()> {
    let model = OpenAiChatClient::new(&config.llm).context("Failed to build model client")?;
    let operation = ExtractArchetypes::new(&model);

    run_batch(
        config,
        &args.batch,
        Columns {
            id: &args.id_column,
            payload: &args.text_column,
            with_index: args.with_index,
        },
        &operation,
        emit_archetypes,
    )
}

pub fn fetch(config: &MemobatchConfig, args: &FetchArgs) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.fetch).context("Failed to build HTTP client")?;
    let base_url = args.base_url.clone().or_else(|| config.fetch.base_url.clone());
    let operation = FetchPage::new(&fetcher, base_url);

    run_batch(
        config,
        &args.batch,
        Columns {
            id: &args.id_column,
            payload: &args.url_column,
            with_index: false,
        },
        &operation,
        emit_page,
    )
}

struct Columns<'a> {
    id: &'a str,
    payload: &'a str,
    with_index: bool,
}

/// Shared driver for every batch command
///
/// Setup failures (unreadable dataset, unusable store, unwritable output) are
/// returned; per-record failures only show up in the summary.
fn run_batch<O, R, F>(
    config: &MemobatchConfig,
    args: &BatchArgs,
    columns: Columns<'_>,
    operation: &O,
    emit: F,
) -> Result<()>
where
    O: Operation,
    R: Tabular,
    F: FnMut(&O::Output) -> error::Result<Vec<R>>,
{
    config.validate().context("Invalid configuration")?;

    // Load before touching the cache so a bad --input never costs cached results
    let mut records = read_records(Path::new(&args.input), columns.id, columns.payload)
        .with_context(|| format!("Failed to load dataset: {}", args.input))?;
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }

    let store_dir = config.store_dir(operation.name());

    if args.clear_cache {
        let removed = clear_store(&store_dir)
            .with_context(|| format!("Failed to clear cache: {}", store_dir.display()))?;
        eprintln!(
            "{} Cleared {} cached entries for {}",
            memobatch_prefix(),
            removed,
            operation.name()
        );
    }

    let store = MemoStore::open(&store_dir)
        .with_context(|| format!("Failed to open cache: {}", store_dir.display()))?;

    info!(
        call = operation.name(),
        store = %store_dir.display(),
        record_count = records.len(),
        "starting run"
    );

    // A store failure aborts here, leaving any previous output in place
    let report = BatchDriver::new(&store)
        .with_progress(LogProgress::new(operation.name()))
        .run(&records, operation, emit)
        .with_context(|| format!("Run aborted, cache unusable: {}", store_dir.display()))?;

    write_rows(
        Path::new(&args.output),
        columns.id,
        &report.rows,
        columns.with_index,
    )
    .with_context(|| format!("Failed to write output: {}", args.output))?;

    eprintln!("{} {}", memobatch_prefix(), summary_line(&report));
    if !report.failures.is_empty() {
        let ids: Vec<&str> = report.failures.iter().map(|f| f.id.as_str()).collect();
        eprintln!("{} Failed records: {}", memobatch_prefix(), ids.join(", "));
    }
    eprintln!("{} Wrote {}", memobatch_prefix(), args.output);

    Ok(())
}
