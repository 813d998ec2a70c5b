use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::aggregate::{AggregatedPopularity, build_temp_path};
use crate::error::SnapshotError;

/// Reads a newline-delimited averages file, skipping malformed lines.
pub fn load_averages(path: &Path) -> Result<Vec<AggregatedPopularity>, SnapshotError> {
    let reader = BufReader::new(File::open(path)?);
    let mut averages = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AggregatedPopularity>(&line) {
            Ok(entry) => averages.push(entry),
            Err(err) => {
                warn!(file = %path.display(), line = index + 1, error = %err, "Skipping malformed average record");
            }
        }
    }

    Ok(averages)
}

/// Ranks by descending average and keeps the first `top_k` ids. The sort is
/// stable, so equal averages keep their input order.
pub fn select_candidates(mut averages: Vec<AggregatedPopularity>, top_k: usize) -> Vec<u64> {
    averages.sort_by(|a, b| b.average_popularity.total_cmp(&a.average_popularity));
    averages.into_iter().take(top_k).map(|entry| entry.id).collect()
}

pub fn write_candidates(path: &Path, ids: &[u64]) -> Result<(), SnapshotError> {
    let temp_path = build_temp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        for id in ids {
            writeln!(writer, "{id}")?;
        }
        writer.flush()?;
    }
    fs::rename(&temp_path, path)?;
    info!(file = %path.display(), candidates = ids.len(), "Wrote ranked candidate list");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: u64, average_popularity: f64) -> AggregatedPopularity {
        AggregatedPopularity {
            id,
            average_popularity,
        }
    }

    #[test]
    fn ties_keep_input_order_and_low_scores_drop() {
        let averages = vec![entry(1, 5.0), entry(2, 9.0), entry(3, 9.0)];
        assert_eq!(select_candidates(averages, 2), vec![2, 3]);
    }

    #[test]
    fn tie_order_follows_input_not_id() {
        let averages = vec![entry(30, 9.0), entry(10, 9.0), entry(20, 9.0)];
        assert_eq!(select_candidates(averages, 3), vec![30, 10, 20]);
    }

    #[test]
    fn top_k_larger_than_input_returns_everything() {
        let averages = vec![entry(4, 1.0), entry(5, 2.0)];
        assert_eq!(select_candidates(averages, 10), vec![5, 4]);
    }

    #[test]
    fn load_skips_bad_lines_and_keeps_file_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("avg.json");
        fs::write(
            &path,
            "{\"id\":1,\"average_popularity\":5.0}\n\
             {broken\n\
             {\"id\":2,\"average_popularity\":9.0}\n\
             {\"id\":3,\"average_popularity\":9.0}\n",
        )
        .unwrap();

        let averages = load_averages(&path).unwrap();
        assert_eq!(select_candidates(averages, 2), vec![2, 3]);
    }

    #[test]
    fn candidate_file_is_one_id_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("popular_actors.txt");
        write_candidates(&path, &[2, 3, 17]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "2\n3\n17\n");
    }
}
