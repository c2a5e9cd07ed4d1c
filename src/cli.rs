use clap::{Args, Parser, Subcommand};

/// Memobatch - memoized batch enrichment of CSV datasets
///
/// Every expensive call (model inference, page fetch) goes through an
/// on-disk, content-addressed cache, so interrupted runs resume for free.
#[derive(Parser, Debug)]
#[command(name = "memobatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Memoized, failure-tolerant batch enrichment of CSV datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Common configuration arguments shared across commands
#[derive(Args, Debug, Clone, Default)]
pub struct CommonConfigArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "MEMOBATCH_CONFIG")]
    pub config: Option<String>,

    /// Cache root directory (one subdirectory per operation)
    #[arg(long, env = "MEMOBATCH_CACHE_DIR")]
    pub cache_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "MEMOBATCH_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize experience accounts with the language model
    Summarize(SummarizeArgs),

    /// Extract Jungian archetypes from summaries (one row per archetype)
    Archetypes(ArchetypesArgs),

    /// Fetch the page behind each record
    Fetch(FetchArgs),

    /// Inspect or clear the memo stores
    Cache(CacheArgs),

    /// Configuration management utilities
    Config(ConfigArgs),
}

impl Commands {
    pub fn common(&self) -> &CommonConfigArgs {
        match self {
            Commands::Summarize(args) => &args.batch.common,
            Commands::Archetypes(args) => &args.batch.common,
            Commands::Fetch(args) => &args.batch.common,
            Commands::Cache(args) => &args.common,
            Commands::Config(args) => &args.common,
        }
    }
}

/// Arguments shared by every batch command
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub common: CommonConfigArgs,

    /// Input CSV file
    #[arg(short, long)]
    pub input: String,

    /// Output CSV file (overwritten)
    #[arg(short, long)]
    pub output: String,

    /// Process only the first N records
    #[arg(long)]
    pub limit: Option<usize>,

    /// Clear this operation's cache before running
    #[arg(long)]
    pub clear_cache: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Column holding the record identifier
    #[arg(long, default_value = "experience_id")]
    pub id_column: String,

    /// Column holding the account to summarize
    #[arg(long, default_value = "experience_account")]
    pub text_column: String,
}

#[derive(Args, Debug, Clone)]
pub struct ArchetypesArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Column holding the record identifier
    #[arg(long, default_value = "experience_id")]
    pub id_column: String,

    /// Column holding the summary text
    #[arg(long, default_value = "summary")]
    pub text_column: String,

    /// Add the per-record ordinal as an `index` column
    #[arg(long)]
    pub with_index: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Column holding the record identifier
    #[arg(long, default_value = "id")]
    pub id_column: String,

    /// Column holding the URL (joined to `fetch.base_url` when relative)
    #[arg(long, default_value = "url")]
    pub url_column: String,

    /// Override `fetch.base_url`
    #[arg(long, env = "MEMOBATCH_FETCH_BASE_URL")]
    pub base_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show entry counts and sizes per operation
    Stats,

    /// List cached entries
    List {
        /// Only list this operation's store
        #[arg(long)]
        operation: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Remove cached entries
    Clear {
        /// Operation whose store is cleared
        #[arg(long, conflicts_with = "all")]
        operation: Option<String>,

        /// Clear every operation's store
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to config file
        path: String,
    },
    /// Print an example config file
    Example,
    /// Show effective configuration (file, discovery or defaults)
    Show,
}
