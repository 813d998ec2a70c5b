use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use popularity_snapshot::config::CliArgs as RankArgs;
use reel_core::config::RuntimeOverrides;

/// Top-level CLI entrypoint.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Refresh the actor, movie and role database", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Download popularity exports and write the ranked candidate list.
    Rank(RankArgs),
    /// Load actors, movies and roles from the catalog into the database.
    Ingest(IngestArgs),
    /// Rank, then ingest the freshly written candidate list.
    Refresh(RefreshArgs),
    /// Inspect or create config.toml.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum SourceMode {
    /// Read ids from the candidate list file.
    #[default]
    Candidates,
    /// Walk the catalog's popular-people listing.
    Listing,
}

/// Catalog and storage flags shared by `ingest` and `refresh`.
#[derive(Debug, Clone, Args, Default)]
pub struct CatalogArgs {
    /// SQLite database to refresh.
    #[arg(long = "database", value_hint = ValueHint::FilePath)]
    pub database: Option<String>,

    /// Catalog API key (defaults to TMDB_API_KEY).
    #[arg(long = "api-key", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Catalog API base URL.
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Delay after every catalog request, in milliseconds.
    #[arg(long = "delay-ms", value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Pages processed between database checkpoints.
    #[arg(long = "pages-per-batch", value_name = "N")]
    pub pages_per_batch: Option<u32>,

    /// Highest listing page to request (0 for no cap).
    #[arg(long = "page-cap", value_name = "N")]
    pub page_cap: Option<u32>,

    /// Candidate ids handled per page.
    #[arg(long = "candidate-page-size", value_name = "N")]
    pub candidate_page_size: Option<usize>,
}

impl CatalogArgs {
    pub fn to_runtime_overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            request_delay_ms: self.delay_ms,
            database_path: self.database.clone(),
            candidates_path: None,
            pages_per_batch: self.pages_per_batch,
            page_cap: self.page_cap,
            candidate_page_size: self.candidate_page_size,
        }
    }
}

#[derive(Debug, Clone, Args, Default)]
pub struct IngestArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Where the ids to ingest come from.
    #[arg(long, value_enum, default_value_t = SourceMode::Candidates)]
    pub mode: SourceMode,

    /// Candidate list to read in `candidates` mode.
    #[arg(long = "candidates", value_hint = ValueHint::FilePath)]
    pub candidates: Option<PathBuf>,
}

impl IngestArgs {
    pub fn to_runtime_overrides(&self) -> RuntimeOverrides {
        let mut overrides = self.catalog.to_runtime_overrides();
        overrides.candidates_path = self
            .candidates
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());
        overrides
    }
}

#[derive(Debug, Clone, Args)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub rank: RankArgs,

    #[command(flatten)]
    pub catalog: CatalogArgs,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets masked.
    Show,
    /// Write a default config.toml.
    Init {
        /// Overwrite an existing file.
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}
