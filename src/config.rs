use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete Memobatch configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemobatchConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Local cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory; every operation gets its own subdirectory
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: ".memobatch/cache".to_string(),
        }
    }
}

/// Language model endpoint (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API base URL, e.g. "http://localhost:7860/v1/"
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model name sent with every request
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            timeout: default_llm_timeout(),
            temperature: 0.0,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Prefix joined to every payload before fetching (payload used as-is if unset)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout
    #[serde(default = "default_fetch_timeout")]
    pub timeout: String,

    /// Pause after each live (uncached) fetch
    #[serde(default = "default_fetch_delay")]
    pub delay: String,

    /// User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: default_fetch_timeout(),
            delay: default_fetch_delay(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }

    pub fn delay(&self) -> Result<Duration> {
        parse_duration(&self.delay)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// Default value functions
fn default_llm_base_url() -> String {
    "http://localhost:7860/v1/".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAIKEY".to_string()
}

fn default_llm_timeout() -> String {
    "120s".to_string()
}

fn default_fetch_timeout() -> String {
    "30s".to_string()
}

fn default_fetch_delay() -> String {
    "1250ms".to_string()
}

fn default_user_agent() -> String {
    format!("memobatch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Parse a duration string such as "250ms", "30s", "5m", "2h" or "1d"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("Empty duration string"));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow!("Missing duration unit: {}. Use: ms, s, m, h, d", s))?;
    let (num_str, unit) = s.split_at(split);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid duration: {}", s))?;

    let duration = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" | "h" | "d" => {
            let factor = match unit {
                "m" => 60,
                "h" => 3600,
                _ => 86400,
            };
            let secs = num
                .checked_mul(factor)
                .ok_or_else(|| anyhow!("Duration too large: {}", s))?;
            Duration::from_secs(secs)
        }
        _ => {
            return Err(anyhow!(
                "Invalid duration unit: {}. Use: ms, s, m, h, d",
                unit
            ))
        }
    };

    Ok(duration)
}

impl MemobatchConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: MemobatchConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Store directory for one operation
    pub fn store_dir(&self, operation: &str) -> PathBuf {
        PathBuf::from(&self.cache.dir).join(operation)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example() -> Result<String> {
        let config = MemobatchConfig {
            cache: CacheConfig {
                dir: ".memobatch/cache".to_string(),
            },
            fetch: FetchConfig {
                base_url: Some("https://www.erowid.org/experiences/".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        config.to_toml()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.dir.trim().is_empty() {
            anyhow::bail!("cache.dir must be set");
        }

        if !is_http_url(&self.llm.base_url) {
            anyhow::bail!(
                "llm.base_url must start with http:// or https://: {}",
                self.llm.base_url
            );
        }

        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must be set");
        }

        if self.llm.api_key_env.trim().is_empty() {
            anyhow::bail!("llm.api_key_env must name an environment variable");
        }

        self.llm.timeout().context("llm.timeout is invalid")?;

        if let Some(base_url) = &self.fetch.base_url {
            if !is_http_url(base_url) {
                anyhow::bail!(
                    "fetch.base_url must start with http:// or https://: {}",
                    base_url
                );
            }
        }

        self.fetch.timeout().context("fetch.timeout is invalid")?;
        self.fetch.delay().context("fetch.delay is invalid")?;

        if !["pretty", "compact", "json"].contains(&self.observability.log_format.as_str()) {
            anyhow::bail!("observability.log_format must be one of: pretty, compact, json");
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
