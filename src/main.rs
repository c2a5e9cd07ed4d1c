use anyhow::Result;
use clap::Parser;

use memobatch::cli::{Cli, Commands};
use memobatch::{commands, config_discovery, logging};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let common = cli.command.common().clone();

    // Configuration decides the log level, so it loads before logging starts
    let (config, source) = config_discovery::load_config_with_discovery(common.config.as_deref())?;
    let config = commands::apply_overrides(config, &common);

    logging::init(
        &config.observability.log_level,
        Some(config.observability.log_format.as_str()),
    );

    match &source {
        Some(path) => tracing::info!("Using config: {}", path.display()),
        None => tracing::debug!("No configuration file found, using defaults"),
    }

    // Dispatch to appropriate command handler
    match &cli.command {
        Commands::Summarize(args) => commands::run::summarize(&config, args),
        Commands::Archetypes(args) => commands::run::archetypes(&config, args),
        Commands::Fetch(args) => commands::run::fetch(&config, args),
        Commands::Cache(args) => commands::cache::cache(&config, args),
        Commands::Config(args) => commands::config::run(&args.command, &config, source.as_deref()),
    }
}
