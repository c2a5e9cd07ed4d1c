/// `memobatch cache` command implementation
///
/// Inspects and clears the per-operation memo stores under `cache.dir`.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{CacheArgs, CacheCommands};
use crate::cli_utils::{format_size, memobatch_prefix};
use crate::config::MemobatchConfig;
use crate::memo::{clear_store, MemoStore};

pub fn cache(config: &MemobatchConfig, args: &CacheArgs) -> Result<()> {
    let root = PathBuf::from(&config.cache.dir);

    match &args.command {
        CacheCommands::Stats => stats(&root),
        CacheCommands::List { operation, verbose } => {
            list(config, &root, operation.as_deref(), *verbose)
        }
        CacheCommands::Clear { operation, all } => clear(config, &root, operation.as_deref(), *all),
    }
}

/// Store directory for a user-supplied operation name
///
/// The name must be a single path component so it always lands under the cache root.
fn named_store(config: &MemobatchConfig, operation: &str) -> Result<PathBuf> {
    let valid = !operation.is_empty()
        && operation != "."
        && operation != ".."
        && !operation.contains(&['/', '\\'][..]);
    if !valid {
        anyhow::bail!("Invalid operation name: {:?}", operation);
    }
    Ok(config.store_dir(operation))
}

/// Operation stores under the cache root, sorted by name
fn operation_stores(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut stores = Vec::new();
    for entry in fs::read_dir(root)
        .with_context(|| format!("Failed to read cache directory: {}", root.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            stores.push((
                entry.file_name().to_string_lossy().into_owned(),
                entry.path(),
            ));
        }
    }

    stores.sort();
    Ok(stores)
}

/// Show cache statistics
fn stats(root: &Path) -> Result<()> {
    let stores = operation_stores(root)?;

    println!("Memo Cache Statistics ({})", root.display());
    println!();

    if stores.is_empty() {
        println!("No cached operations.");
        return Ok(());
    }

    let mut total_entries = 0;
    let mut total_size = 0;

    for (name, dir) in &stores {
        let store = MemoStore::inspect(dir)?;
        let stats = store.stats()?;
        println!(
            "  {}: {} entries, {}",
            name,
            stats.total_entries,
            format_size(stats.total_size_bytes)
        );
        total_entries += stats.total_entries;
        total_size += stats.total_size_bytes;
    }

    println!();
    println!("Total entries: {}", total_entries);
    println!("Total size: {}", format_size(total_size));

    Ok(())
}

/// List cached entries
fn list(
    config: &MemobatchConfig,
    root: &Path,
    operation: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let stores = match operation {
        Some(op) => vec![(op.to_string(), named_store(config, op)?)],
        None => operation_stores(root)?,
    };

    let mut shown = 0;
    for (name, dir) in stores {
        if !dir.is_dir() {
            continue;
        }

        let entries = MemoStore::inspect(&dir)?
            .list()
            .with_context(|| format!("Failed to list cache entries: {}", dir.display()))?;
        if entries.is_empty() {
            continue;
        }

        println!("{} ({} entries):", name, entries.len());
        for entry in entries {
            let created = entry
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unreadable".to_string());
            println!("  {}  {}", entry.key, created);

            if verbose {
                println!(
                    "    Operation: {}",
                    entry.operation.as_deref().unwrap_or("unknown")
                );
                println!("    Size: {}", format_size(entry.size_bytes));
            }
            shown += 1;
        }
        println!();
    }

    if shown == 0 {
        println!("No cached entries.");
    }

    Ok(())
}

/// Clear one operation's store or all of them
fn clear(config: &MemobatchConfig, root: &Path, operation: Option<&str>, all: bool) -> Result<()> {
    if all {
        println!("{} Clearing all caches...", memobatch_prefix());
        let mut removed = 0;
        for (_, dir) in operation_stores(root)? {
            removed += clear_store(&dir)
                .with_context(|| format!("Failed to clear cache: {}", dir.display()))?;
        }
        println!("{} Removed {} entries.", memobatch_prefix(), removed);
        return Ok(());
    }

    let Some(operation) = operation else {
        anyhow::bail!("Specify --all to clear every cache, or --operation <name>");
    };

    let dir = named_store(config, operation)?;
    let removed =
        clear_store(&dir).with_context(|| format!("Failed to clear cache: {}", dir.display()))?;
    println!(
        "{} Removed {} entries from {}.",
        memobatch_prefix(),
        removed,
        operation
    );

    Ok(())
}
