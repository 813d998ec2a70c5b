//! Core library for loading popular actors, their movies and their ages into
//! the SQLite database behind the quiz front end.

pub mod age;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod model;
pub mod pacer;
pub mod runtime;
pub mod storage;

pub use catalog::{Catalog, HttpCatalog};
pub use config::{
    CatalogPreferences, ConfigError, ConfigLoadResult, ConfigSource, FileConfig,
    IngestPreferences, RuntimeOverrides, apply_runtime_overrides, config_directory, config_path,
    load_config, load_config_from, save_config,
};
pub use error::{CatalogError, DataError, ReelError};
pub use fetcher::{CatalogFetcher, IngestSettings, IngestSource, IngestStats, RunState};
pub use logging::{LoggingDestination, LoggingError, current_log_path, init_logging};
pub use pacer::{ManualClock, RequestPacer, Sleeper, ThreadSleeper};
pub use runtime::{IngestReport, ingest_with, run_ingest};
pub use storage::{Storage, TableCounts};
