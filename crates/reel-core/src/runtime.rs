use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::catalog::{Catalog, HttpCatalog};
use crate::config::FileConfig;
use crate::error::ReelError;
use crate::fetcher::{CatalogFetcher, IngestSettings, IngestSource, IngestStats};
use crate::pacer::RequestPacer;
use crate::storage::{Storage, TableCounts};

/// Outcome of a completed ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub database_path: PathBuf,
    pub stats: IngestStats,
    pub counts: TableCounts,
}

/// Runs an ingestion against the HTTP catalog described by `config`.
pub fn run_ingest(config: &FileConfig, source: IngestSource) -> Result<IngestReport, ReelError> {
    let catalog = HttpCatalog::new(&config.catalog)?;
    let pacer = RequestPacer::new(config.catalog.request_delay());
    let settings = IngestSettings::from(&config.ingest);
    ingest_with(
        catalog,
        pacer,
        &config.ingest.database_path(),
        settings,
        source,
    )
}

/// Opens the database at `database_path`, runs one ingestion and closes the
/// database again, whether or not the run succeeded.
pub fn ingest_with<C: Catalog>(
    catalog: C,
    pacer: RequestPacer,
    database_path: &Path,
    settings: IngestSettings,
    source: IngestSource,
) -> Result<IngestReport, ReelError> {
    ensure_parent_directory(database_path)?;
    let started = Instant::now();
    info!(database = %database_path.display(), "Opening database");
    let mut storage = Storage::open(database_path)?;

    let outcome = CatalogFetcher::new(catalog, pacer, &mut storage, settings)
        .run(source)
        .and_then(|stats| Ok((stats, storage.counts()?)));

    let closed = storage.close();
    let (stats, counts) = outcome?;
    closed?;

    info!(
        actors = counts.actors,
        movies = counts.movies,
        roles = counts.roles,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Database refreshed"
    );

    Ok(IngestReport {
        database_path: database_path.to_path_buf(),
        stats,
        counts,
    })
}

fn ensure_parent_directory(path: &Path) -> Result<(), ReelError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
