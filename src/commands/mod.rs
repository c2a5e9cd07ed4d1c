pub mod cache;
pub mod config;
pub mod run;

use crate::cli::CommonConfigArgs;
use crate::config::MemobatchConfig;

/// Apply command-line overrides on top of a loaded configuration
pub fn apply_overrides(mut config: MemobatchConfig, common: &CommonConfigArgs) -> MemobatchConfig {
    if let Some(dir) = &common.cache_dir {
        config.cache.dir = dir.clone();
    }
    if let Some(level) = &common.log_level {
        config.observability.log_level = level.clone();
    }
    config
}
