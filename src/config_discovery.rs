use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::MemobatchConfig;

/// Project-level configuration file name
pub const CONFIG_FILE_NAME: &str = "memobatch.toml";

/// Discovers Memobatch configuration by traversing up the directory tree
///
/// Falls back to the global `config.toml` in the user config directory.
pub fn discover_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        // Try to go up one level
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    let global_config = global_config_path();
    if global_config.exists() {
        return Ok(Some(global_config));
    }

    Ok(None)
}

/// Global configuration path
///
/// Respects XDG_CONFIG_HOME, then the platform config directory, then
/// `$HOME/.config`.
pub fn global_config_path() -> PathBuf {
    let base = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config)
    } else if let Some(config) = dirs::config_dir() {
        config
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config")
    } else {
        PathBuf::from(".config")
    };

    base.join("memobatch").join("config.toml")
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path.
/// Otherwise, auto-discovers config by traversing up directory tree from cwd,
/// and falls back to defaults when nothing is found.
///
/// Returns the configuration and the file it came from, if any.
pub fn load_config_with_discovery(
    explicit_path: Option<&str>,
) -> Result<(MemobatchConfig, Option<PathBuf>)> {
    if let Some(config_path) = explicit_path {
        let config = MemobatchConfig::from_file(config_path)?;
        return Ok((config, Some(PathBuf::from(config_path))));
    }

    let current_dir =
        std::env::current_dir().context("Failed to get current directory for config discovery")?;

    match discover_config(&current_dir)? {
        Some(config_path) => {
            let config = MemobatchConfig::from_file(&config_path)?;
            Ok((config, Some(config_path)))
        }
        None => Ok((MemobatchConfig::default(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_config_finds_nearest() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        // Create nested structure
        let project = root.join("project");
        let subdir = project.join("subdir");
        fs::create_dir_all(&subdir).unwrap();

        // Create config in project root
        let config_path = project.join(CONFIG_FILE_NAME);
        fs::write(&config_path, "# test config").unwrap();

        // Search from subdir should find project config
        let found = discover_config(&subdir).unwrap();
        assert_eq!(found, Some(config_path));
    }

    #[test]
    #[serial]
    fn test_global_config_respects_xdg_env() {
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
        let path = global_config_path();
        assert_eq!(
            path,
            PathBuf::from("/tmp/test-config/memobatch/config.toml")
        );
        std::env::remove_var("XDG_CONFIG_HOME");
    }

    #[test]
    fn test_explicit_path_is_loaded() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("custom.toml");
        fs::write(&config_path, "[cache]\ndir = \"/tmp/memo\"\n").unwrap();

        let (config, source) = load_config_with_discovery(config_path.to_str()).unwrap();
        assert_eq!(config.cache.dir, "/tmp/memo");
        assert_eq!(source, Some(config_path));
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        assert!(load_config_with_discovery(missing.to_str()).is_err());
    }
}
