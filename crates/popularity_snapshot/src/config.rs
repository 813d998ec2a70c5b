use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::error::SnapshotError;

pub const DEFAULT_EXPORT_ROOT: &str = "http://files.tmdb.org/p/exports/";

/// CLI surface for the popularity ranking run.
#[derive(Debug, Args, Clone)]
pub struct CliArgs {
    /// Directory that receives the downloaded and decompressed exports.
    #[arg(
        long = "archive-dir",
        value_name = "DIR",
        default_value = "archives"
    )]
    pub archive_dir: PathBuf,

    /// Output path for the newline-delimited average popularity records.
    #[arg(
        long = "averages",
        value_name = "FILE",
        default_value = "archives/average_popularity.json"
    )]
    pub averages: PathBuf,

    /// Output path for the ranked candidate id list.
    #[arg(
        long = "candidates",
        value_name = "FILE",
        default_value = "popular_actors.txt"
    )]
    pub candidates: PathBuf,

    /// Keep downloaded and decompressed exports after ranking.
    #[arg(long = "keep-archives")]
    pub keep_archives: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("archives"),
            averages: PathBuf::from("archives/average_popularity.json"),
            candidates: PathBuf::from("popular_actors.txt"),
            keep_archives: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tunables {
    pub export_root: String,
    pub snapshot_count: usize,
    pub days_between_exports: i64,
    pub popularity_cutoff: f64,
    pub candidate_count: usize,
    pub download_timeout_secs: u64,
    /// Upper bound on one export transfer, body included.
    pub transfer_timeout_secs: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            export_root: DEFAULT_EXPORT_ROOT.to_string(),
            snapshot_count: 3,
            days_between_exports: 28,
            popularity_cutoff: 20.0,
            candidate_count: 1_000,
            download_timeout_secs: 7,
            transfer_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub archive_dir: PathBuf,
    pub averages: PathBuf,
    pub candidates: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: Paths,
    pub tunables: Tunables,
    pub keep_archives: bool,
}

impl CliArgs {
    pub fn resolve(self) -> Result<AppConfig, SnapshotError> {
        let archive_dir = resolve_path(&self.archive_dir)?;
        let averages = resolve_path(&self.averages)?;
        let candidates = resolve_path(&self.candidates)?;

        if !archive_dir.exists() {
            fs::create_dir_all(&archive_dir)?;
        }
        ensure_parent_directory(&averages)?;
        ensure_parent_directory(&candidates)?;

        let tunables = Tunables::from_env()?;

        Ok(AppConfig {
            paths: Paths {
                archive_dir,
                averages,
                candidates,
            },
            tunables,
            keep_archives: self.keep_archives,
        })
    }
}

impl Tunables {
    pub fn from_env() -> Result<Self, SnapshotError> {
        let defaults = Self::default();

        let export_root = env::var("EXPORT_ROOT").unwrap_or(defaults.export_root);
        let snapshot_count = parse_env("SNAPSHOT_COUNT", defaults.snapshot_count, |s| {
            s.parse::<usize>()
        })?;
        let days_between_exports = parse_env(
            "DAYS_BETWEEN_EXPORTS",
            defaults.days_between_exports,
            |s| s.parse::<i64>(),
        )?;
        let popularity_cutoff = parse_env("POPULARITY_CUTOFF", defaults.popularity_cutoff, |s| {
            s.parse::<f64>()
        })?;
        let candidate_count = parse_env("CANDIDATE_COUNT", defaults.candidate_count, |s| {
            s.parse::<usize>()
        })?;
        let download_timeout_secs = parse_env(
            "DOWNLOAD_TIMEOUT_SECS",
            defaults.download_timeout_secs,
            |s| s.parse::<u64>(),
        )?;
        let transfer_timeout_secs = parse_env(
            "TRANSFER_TIMEOUT_SECS",
            defaults.transfer_timeout_secs,
            |s| s.parse::<u64>(),
        )?;

        let tunables = Self {
            export_root,
            snapshot_count,
            days_between_exports,
            popularity_cutoff,
            candidate_count,
            download_timeout_secs,
            transfer_timeout_secs,
        };
        tunables.validate()?;
        Ok(tunables)
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.snapshot_count == 0 {
            return Err(SnapshotError::Config(
                "SNAPSHOT_COUNT must be at least 1".to_string(),
            ));
        }
        if self.days_between_exports <= 0 {
            return Err(SnapshotError::Config(
                "DAYS_BETWEEN_EXPORTS must be positive".to_string(),
            ));
        }
        if self.download_timeout_secs == 0 || self.transfer_timeout_secs == 0 {
            return Err(SnapshotError::Config(
                "DOWNLOAD_TIMEOUT_SECS and TRANSFER_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        if !self.popularity_cutoff.is_finite() {
            return Err(SnapshotError::Config(
                "POPULARITY_CUTOFF must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T, F, E>(var: &str, default: T, mut parser: F) -> Result<T, SnapshotError>
where
    F: FnMut(&str) -> Result<T, E>,
    E: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) => match parser(value.trim()) {
            Ok(parsed) => Ok(parsed),
            Err(err) => Err(SnapshotError::Config(format!(
                "invalid value for {}: {}",
                var, err
            ))),
        },
        Err(_) => Ok(default),
    }
}

fn resolve_path(path: &Path) -> Result<PathBuf, SnapshotError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

fn ensure_parent_directory(path: &Path) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
