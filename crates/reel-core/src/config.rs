use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR_NAME: &str = "reeltime";
const CONFIG_FILE_NAME: &str = "config.toml";
const CURRENT_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No persisted configuration was found or usable; defaults were synthesized.
    Default,
    /// Configuration was read from `config.toml`.
    File,
}

/// Errors that can occur when persisting configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Ser(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {err}"),
            ConfigError::Ser(err) => write!(f, "TOML serialization error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Ser(value)
    }
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub catalog: CatalogPreferences,
    #[serde(default)]
    pub ingest: IngestPreferences,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            catalog: CatalogPreferences::default(),
            ingest: IngestPreferences::default(),
        }
    }
}

impl FileConfig {
    const fn schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }
}

/// Catalog API access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPreferences {
    #[serde(default = "CatalogPreferences::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "CatalogPreferences::default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "CatalogPreferences::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogPreferences {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_key: None,
            request_delay_ms: Self::default_request_delay_ms(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl CatalogPreferences {
    fn default_base_url() -> String {
        DEFAULT_CATALOG_BASE_URL.to_string()
    }

    const fn default_request_delay_ms() -> u64 {
        2_000
    }

    const fn default_timeout_secs() -> u64 {
        10
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Where and how the ingestion run writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestPreferences {
    #[serde(default = "IngestPreferences::default_database_path")]
    pub database_path: String,
    #[serde(default = "IngestPreferences::default_candidates_path")]
    pub candidates_path: String,
    #[serde(default = "IngestPreferences::default_pages_per_batch")]
    pub pages_per_batch: u32,
    #[serde(default = "IngestPreferences::default_page_cap")]
    pub page_cap: u32,
    #[serde(default = "IngestPreferences::default_candidate_page_size")]
    pub candidate_page_size: usize,
}

impl Default for IngestPreferences {
    fn default() -> Self {
        Self {
            database_path: Self::default_database_path(),
            candidates_path: Self::default_candidates_path(),
            pages_per_batch: Self::default_pages_per_batch(),
            page_cap: Self::default_page_cap(),
            candidate_page_size: Self::default_candidate_page_size(),
        }
    }
}

impl IngestPreferences {
    fn default_database_path() -> String {
        "instance/moviedata.db".to_string()
    }

    fn default_candidates_path() -> String {
        "popular_actors.txt".to_string()
    }

    const fn default_pages_per_batch() -> u32 {
        10
    }

    const fn default_page_cap() -> u32 {
        21
    }

    const fn default_candidate_page_size() -> usize {
        20
    }

    pub fn database_path(&self) -> PathBuf {
        expand_path(&self.database_path)
    }

    pub fn candidates_path(&self) -> PathBuf {
        expand_path(&self.candidates_path)
    }
}

/// Overrides sourced from the environment or CLI flags.
#[derive(Debug, Default, Clone)]
pub struct RuntimeOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_delay_ms: Option<u64>,
    pub database_path: Option<String>,
    pub candidates_path: Option<String>,
    pub pages_per_batch: Option<u32>,
    pub page_cap: Option<u32>,
    pub candidate_page_size: Option<usize>,
}

impl RuntimeOverrides {
    pub fn is_empty(&self) -> bool {
        self.base_url.is_none()
            && self.api_key.is_none()
            && self.request_delay_ms.is_none()
            && self.database_path.is_none()
            && self.candidates_path.is_none()
            && self.pages_per_batch.is_none()
            && self.page_cap.is_none()
            && self.candidate_page_size.is_none()
    }

    /// Reads `TMDB_API_KEY`, `TMDB_BASE_URL` and `REELTIME_DATABASE`.
    pub fn from_env() -> Self {
        Self {
            base_url: non_empty_env("TMDB_BASE_URL"),
            api_key: non_empty_env("TMDB_API_KEY"),
            database_path: non_empty_env("REELTIME_DATABASE"),
            ..Self::default()
        }
    }
}

/// Path to the configuration directory.
pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

pub fn config_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

pub fn load_config() -> ConfigLoadResult {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> ConfigLoadResult {
    let mut warnings = Vec::new();

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<FileConfig>(&raw) {
                Ok(cfg) => {
                    let (cfg, mut sanitize_warnings) = sanitize_config(cfg);
                    warnings.append(&mut sanitize_warnings);
                    return ConfigLoadResult {
                        config: cfg,
                        warnings,
                        source: ConfigSource::File,
                    };
                }
                Err(err) => {
                    warnings.push(format!(
                        "Failed to parse {} as TOML: {}. Falling back to defaults.",
                        path.display(),
                        err
                    ));
                }
            },
            Err(err) => {
                warnings.push(format!(
                    "Failed to read {}: {}. Falling back to defaults.",
                    path.display(),
                    err
                ));
            }
        }
    }

    ConfigLoadResult {
        config: FileConfig::default(),
        warnings,
        source: ConfigSource::Default,
    }
}

pub fn save_config(config: &FileConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, config)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(config)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn sanitize_config(mut config: FileConfig) -> (FileConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.schema_version != CURRENT_SCHEMA_VERSION {
        warnings.push(format!(
            "Unknown config schema version {}. Resetting to {}.",
            config.schema_version, CURRENT_SCHEMA_VERSION
        ));
        return (FileConfig::default(), warnings);
    }

    if config.catalog.base_url.trim().is_empty() {
        warnings.push(format!(
            "Catalog base_url is empty. Resetting to {}.",
            DEFAULT_CATALOG_BASE_URL
        ));
        config.catalog.base_url = CatalogPreferences::default_base_url();
    }
    if config.catalog.timeout_secs == 0 {
        warnings.push("Catalog timeout_secs must be positive. Resetting to 10.".to_string());
        config.catalog.timeout_secs = CatalogPreferences::default_timeout_secs();
    }
    if config.ingest.pages_per_batch == 0 {
        warnings.push("Ingest pages_per_batch must be positive. Resetting to 10.".to_string());
        config.ingest.pages_per_batch = IngestPreferences::default_pages_per_batch();
    }
    if config.ingest.candidate_page_size == 0 {
        warnings.push("Ingest candidate_page_size must be positive. Resetting to 20.".to_string());
        config.ingest.candidate_page_size = IngestPreferences::default_candidate_page_size();
    }
    if config.ingest.database_path.trim().is_empty() {
        warnings.push("Ingest database_path is empty. Resetting to default.".to_string());
        config.ingest.database_path = IngestPreferences::default_database_path();
    }

    (config, warnings)
}

pub fn apply_runtime_overrides(
    config: &mut FileConfig,
    overrides: &RuntimeOverrides,
    warnings: &mut Vec<String>,
) {
    if let Some(ref value) = overrides.base_url {
        config.catalog.base_url = value.clone();
    }
    if let Some(ref value) = overrides.api_key {
        config.catalog.api_key = Some(value.clone());
    }
    if let Some(value) = overrides.request_delay_ms {
        config.catalog.request_delay_ms = value;
    }
    if let Some(ref value) = overrides.database_path {
        config.ingest.database_path = value.clone();
    }
    if let Some(ref value) = overrides.candidates_path {
        config.ingest.candidates_path = value.clone();
    }
    if let Some(value) = overrides.pages_per_batch {
        if value == 0 {
            warnings.push("pages per batch must be at least 1. Ignoring override.".to_string());
        } else {
            config.ingest.pages_per_batch = value;
        }
    }
    if let Some(value) = overrides.page_cap {
        config.ingest.page_cap = value;
    }
    if let Some(value) = overrides.candidate_page_size {
        if value == 0 {
            warnings.push("candidate page size must be at least 1. Ignoring override.".to_string());
        } else {
            config.ingest.candidate_page_size = value;
        }
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let result = load_config_from(&dir.path().join("config.toml"));
        assert_eq!(result.source, ConfigSource::Default);
        assert!(result.warnings.is_empty());
        assert_eq!(result.config.catalog.request_delay_ms, 2_000);
        assert_eq!(result.config.ingest.page_cap, 21);
        assert_eq!(result.config.ingest.pages_per_batch, 10);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ingest]\npage_cap = 3\n").unwrap();

        let result = load_config_from(&path);
        assert_eq!(result.source, ConfigSource::File);
        assert_eq!(result.config.ingest.page_cap, 3);
        assert_eq!(result.config.ingest.candidate_page_size, 20);
        assert_eq!(result.config.catalog.base_url, DEFAULT_CATALOG_BASE_URL);
    }

    #[test]
    fn test_bad_toml_falls_back_with_warning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ingest\npage_cap = ").unwrap();

        let result = load_config_from(&path);
        assert_eq!(result.source, ConfigSource::Default);
        assert!(result.warnings.iter().any(|w| w.contains("TOML")));
    }

    #[test]
    fn test_sanitize_resets_zero_batch_size() {
        let mut config = FileConfig::default();
        config.ingest.pages_per_batch = 0;
        let (sanitized, warnings) = sanitize_config(config);
        assert_eq!(sanitized.ingest.pages_per_batch, 10);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unknown_schema_version_resets() {
        let config = FileConfig {
            schema_version: 99,
            ..FileConfig::default()
        };
        let (sanitized, warnings) = sanitize_config(config);
        assert_eq!(sanitized, FileConfig::default());
        assert!(warnings[0].contains("schema version 99"));
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = FileConfig::default();
        config.catalog.api_key = Some("secret".to_string());
        config.ingest.database_path = "/tmp/movies.db".to_string();

        save_config_to(&path, &config).unwrap();
        let loaded = load_config_from(&path);
        assert_eq!(loaded.config, config);
    }

    #[test]
    fn test_overrides_apply_and_reject_zero() {
        let mut config = FileConfig::default();
        let overrides = RuntimeOverrides {
            api_key: Some("k".to_string()),
            pages_per_batch: Some(0),
            page_cap: Some(2),
            ..RuntimeOverrides::default()
        };
        assert!(!overrides.is_empty());

        let mut warnings = Vec::new();
        apply_runtime_overrides(&mut config, &overrides, &mut warnings);
        assert_eq!(config.catalog.api_key.as_deref(), Some("k"));
        assert_eq!(config.ingest.page_cap, 2);
        assert_eq!(config.ingest.pages_per_batch, 10);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_tilde_paths_expand() {
        let prefs = IngestPreferences {
            database_path: "~/movies.db".to_string(),
            ..IngestPreferences::default()
        };
        assert!(!prefs.database_path().to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
    }
}
