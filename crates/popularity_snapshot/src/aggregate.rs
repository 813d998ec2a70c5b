use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::SnapshotError;

/// One `{id, popularity}` line from a person export.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PopularityRecord {
    pub id: u64,
    pub popularity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPopularity {
    pub id: u64,
    pub average_popularity: f64,
}

/// Popularity observations grouped by id, in first-seen order.
#[derive(Debug, Default)]
pub struct PopularityObservations {
    index: HashMap<u64, usize>,
    entries: Vec<(u64, Vec<f64>)>,
}

impl PopularityObservations {
    pub fn record(&mut self, record: PopularityRecord) {
        match self.index.get(&record.id) {
            Some(&slot) => self.entries[slot].1.push(record.popularity),
            None => {
                self.index.insert(record.id, self.entries.len());
                self.entries.push((record.id, vec![record.popularity]));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Averages every id over `snapshot_count`. Snapshots an id is missing
    /// from contribute zero, so the divisor never shrinks.
    pub fn averages(&self, snapshot_count: usize) -> Vec<AggregatedPopularity> {
        let divisor = snapshot_count.max(1) as f64;
        self.entries
            .iter()
            .map(|(id, values)| AggregatedPopularity {
                id: *id,
                average_popularity: values.iter().sum::<f64>() / divisor,
            })
            .collect()
    }
}

/// Streams every export and keeps the records at or above `cutoff`.
/// Malformed lines and unreadable files are logged and skipped.
pub fn collect_observations(files: &[PathBuf], cutoff: f64) -> PopularityObservations {
    let mut observations = PopularityObservations::default();
    info!(files = files.len(), cutoff, "Streaming popular people from exports");

    for path in files {
        match stream_file(path, cutoff, &mut observations) {
            Ok(kept) => info!(file = %path.display(), kept, "Finished filtering export"),
            Err(err) => error!(file = %path.display(), error = %err, "Failed to read export"),
        }
    }

    observations
}

fn stream_file(
    path: &Path,
    cutoff: f64,
    observations: &mut PopularityObservations,
) -> Result<usize, SnapshotError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    let mut kept = 0usize;
    let mut line_number = 0usize;

    // Raw bytes, so a line with broken UTF-8 is skipped instead of ending the file.
    while reader.read_until(b'\n', &mut buf)? > 0 {
        line_number += 1;
        let line = buf.trim_ascii();
        if !line.is_empty() {
            match serde_json::from_slice::<PopularityRecord>(line) {
                Ok(record) if record.popularity >= cutoff => {
                    observations.record(record);
                    kept += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(file = %path.display(), line = line_number, error = %err, "Skipping malformed export record");
                }
            }
        }
        buf.clear();
    }

    Ok(kept)
}

/// Writes averages as newline-delimited JSON through a temp file.
pub fn write_averages(path: &Path, averages: &[AggregatedPopularity]) -> Result<(), SnapshotError> {
    let temp_path = build_temp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        for entry in averages {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&temp_path, path)?;
    info!(file = %path.display(), entries = averages.len(), "Wrote average popularity");
    Ok(())
}

pub(crate) fn build_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => {
            temp_path.set_extension(format!("{ext}.tmp"));
        }
        _ => {
            temp_path.set_extension("tmp");
        }
    }
    temp_path
}
