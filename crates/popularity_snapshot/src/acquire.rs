use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_LENGTH;
use tracing::{debug, error, info, warn};

use crate::config::Tunables;
use crate::error::SnapshotError;

const CHUNK_SIZE: usize = 64 * 1024;

/// One dated popularity export and where it lives on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSnapshot {
    pub url: String,
    pub compressed_path: PathBuf,
    pub decompressed_path: PathBuf,
    pub expected_bytes: Option<u64>,
    pub actual_bytes: u64,
}

impl ExportSnapshot {
    pub fn size_verified(&self) -> bool {
        self.expected_bytes == Some(self.actual_bytes)
    }
}

/// Filename of the person export published on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("person_ids_{}.json.gz", date.format("%m_%d_%Y"))
}

/// Plans the exports to fetch, starting the day before `today` and stepping
/// back `days_between_exports` days per snapshot.
pub fn plan_exports(today: NaiveDate, tunables: &Tunables, archive_dir: &Path) -> Vec<ExportSnapshot> {
    let root = tunables.export_root.trim_end_matches('/');
    let step = ChronoDuration::days(tunables.days_between_exports);
    let mut date = today - ChronoDuration::days(1);
    let mut planned = Vec::with_capacity(tunables.snapshot_count);

    for _ in 0..tunables.snapshot_count {
        let file_name = export_file_name(date);
        let compressed_path = archive_dir.join(&file_name);
        let decompressed_path = archive_dir.join(file_name.trim_end_matches(".gz"));
        planned.push(ExportSnapshot {
            url: format!("{root}/{file_name}"),
            compressed_path,
            decompressed_path,
            expected_bytes: None,
            actual_bytes: 0,
        });
        date -= step;
    }

    planned
}

pub fn build_client(tunables: &Tunables) -> Result<Client, SnapshotError> {
    Ok(Client::builder()
        .user_agent("reeltime-popularity-snapshot/0.1")
        .connect_timeout(Duration::from_secs(tunables.download_timeout_secs))
        .timeout(Duration::from_secs(tunables.transfer_timeout_secs))
        .build()?)
}

/// Downloads every planned export. Snapshots whose transfer fails are logged
/// and left out; a byte-count mismatch is logged but the snapshot is kept.
pub fn download_exports(client: &Client, planned: Vec<ExportSnapshot>) -> Vec<ExportSnapshot> {
    let mut downloaded = Vec::with_capacity(planned.len());

    for snapshot in planned {
        match download_export(client, snapshot) {
            Ok(snapshot) => {
                if snapshot.size_verified() {
                    info!(url = %snapshot.url, bytes = snapshot.actual_bytes, "Download verified");
                } else {
                    error!(
                        url = %snapshot.url,
                        expected = ?snapshot.expected_bytes,
                        actual = snapshot.actual_bytes,
                        "Download incomplete; continuing to decompression"
                    );
                }
                downloaded.push(snapshot);
            }
            Err((snapshot, err)) => {
                warn!(url = %snapshot.url, error = %err, "Skipping export that failed to download");
                let _ = fs::remove_file(&snapshot.compressed_path);
            }
        }
    }

    downloaded
}

fn download_export(
    client: &Client,
    mut snapshot: ExportSnapshot,
) -> Result<ExportSnapshot, (ExportSnapshot, SnapshotError)> {
    info!(url = %snapshot.url, "Starting download");

    let response = match client
        .get(&snapshot.url)
        .send()
        .and_then(|response| response.error_for_status())
    {
        Ok(response) => response,
        Err(err) => return Err((snapshot, err.into())),
    };

    // The declared length comes from the header rather than the body hint so
    // a missing header is reported as unknown instead of zero.
    let expected = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    snapshot.expected_bytes = expected;

    let file = match File::create(&snapshot.compressed_path) {
        Ok(file) => file,
        Err(err) => return Err((snapshot, err.into())),
    };

    let mut writer = BufWriter::new(file);
    match copy_with_progress(response, &mut writer, expected, &snapshot.url)
        .and_then(|written| writer.flush().map(|_| written).map_err(SnapshotError::from))
    {
        Ok(written) => {
            snapshot.actual_bytes = written;
            Ok(snapshot)
        }
        Err(err) => Err((snapshot, err)),
    }
}

/// Streams `reader` into `writer`, logging every 10% of the declared length.
/// Returns the number of bytes written.
pub fn copy_with_progress<R: Read, W: Write>(
    mut reader: R,
    writer: &mut W,
    expected: Option<u64>,
    label: &str,
) -> Result<u64, SnapshotError> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    let mut next_report = 10u64;

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
        written += read as u64;

        if let Some(total) = expected.filter(|total| *total > 0) {
            let percent = written.saturating_mul(100) / total;
            while next_report <= percent.min(100) {
                debug!(file = label, progress = next_report, "Download progress");
                next_report += 10;
            }
        }
    }

    Ok(written)
}
