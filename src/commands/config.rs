use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::cli::ConfigCommands;
use crate::config::MemobatchConfig;

pub fn run(command: &ConfigCommands, effective: &MemobatchConfig, source: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommands::Validate { path } => validate(path),
        ConfigCommands::Example => example(),
        ConfigCommands::Show => show(effective, source),
    }
}

fn validate(path: &str) -> Result<()> {
    info!("Validating config file: {}", path);

    let config = MemobatchConfig::from_file(path)?;
    config.validate()?;

    println!("✓ Configuration file is valid: {}", path);
    println!("\nSummary:");
    println!("  - Cache directory: {}", config.cache.dir);
    println!("  - Model: {} at {}", config.llm.model, config.llm.base_url);
    println!("  - API key variable: {}", config.llm.api_key_env);
    match &config.fetch.base_url {
        Some(base) => println!("  - Fetch base URL: {} (delay {})", base, config.fetch.delay),
        None => println!("  - Fetch base URL: none (delay {})", config.fetch.delay),
    }

    Ok(())
}

fn example() -> Result<()> {
    println!("{}", MemobatchConfig::example()?);
    Ok(())
}

fn show(config: &MemobatchConfig, source: Option<&Path>) -> Result<()> {
    info!("Showing effective configuration");

    match source {
        Some(path) => println!("# Loaded from {}\n", path.display()),
        None => println!("# No configuration file found; defaults\n"),
    }
    println!("{}", config.to_toml()?);

    Ok(())
}
