pub mod acquire;
pub mod aggregate;
pub mod config;
pub mod decompress;
pub mod error;
pub mod select;

use std::path::PathBuf;

use chrono::Local;
use tracing::info;

use acquire::{build_client, download_exports, plan_exports};
use aggregate::{collect_observations, write_averages};
use config::{AppConfig, CliArgs, Paths, Tunables};
use decompress::{decompress_snapshots, remove_artifacts};
use error::SnapshotError;
use select::{load_averages, select_candidates, write_candidates};

/// Counts reported after a ranking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingSummary {
    pub planned_snapshots: usize,
    pub usable_snapshots: usize,
    pub ranked_ids: usize,
    pub candidates: usize,
    pub candidates_path: PathBuf,
}

pub fn run(cli: CliArgs) -> Result<RankingSummary, SnapshotError> {
    let AppConfig {
        paths,
        tunables,
        keep_archives,
    } = cli.resolve()?;

    let client = build_client(&tunables)?;
    let planned = plan_exports(Local::now().date_naive(), &tunables, &paths.archive_dir);
    let planned_count = planned.len();
    info!(exports = planned_count, "Fetching popularity exports");

    let downloaded = download_exports(&client, planned);
    let usable = decompress_snapshots(&downloaded);

    let mut summary = rank_exports(&usable, &tunables, &paths)?;
    summary.planned_snapshots = planned_count;

    if keep_archives {
        info!(dir = %paths.archive_dir.display(), "Keeping export archives");
    } else {
        remove_artifacts(&downloaded);
    }

    Ok(summary)
}

/// Aggregates decompressed exports, writes the averages file, then ranks it
/// into the candidate list. Averages always divide by the configured
/// snapshot count, however many files are passed in.
pub fn rank_exports(
    files: &[PathBuf],
    tunables: &Tunables,
    paths: &Paths,
) -> Result<RankingSummary, SnapshotError> {
    let observations = collect_observations(files, tunables.popularity_cutoff);
    let averages = observations.averages(tunables.snapshot_count);
    write_averages(&paths.averages, &averages)?;

    let ranked = load_averages(&paths.averages)?;
    let ranked_ids = ranked.len();
    let candidates = select_candidates(ranked, tunables.candidate_count);
    write_candidates(&paths.candidates, &candidates)?;

    info!(
        usable = files.len(),
        ranked = ranked_ids,
        candidates = candidates.len(),
        "Candidate list ready for catalog ingestion"
    );

    Ok(RankingSummary {
        planned_snapshots: tunables.snapshot_count,
        usable_snapshots: files.len(),
        ranked_ids,
        candidates: candidates.len(),
        candidates_path: paths.candidates.clone(),
    })
}
