use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{error, info};

use crate::acquire::ExportSnapshot;
use crate::error::SnapshotError;

/// Decompresses each snapshot next to its archive and returns the paths that
/// produced non-empty content. Empty or corrupt outputs are removed.
pub fn decompress_snapshots(snapshots: &[ExportSnapshot]) -> Vec<PathBuf> {
    let mut decompressed = Vec::with_capacity(snapshots.len());

    for snapshot in snapshots {
        let source = &snapshot.compressed_path;
        let target = &snapshot.decompressed_path;
        info!(from = %source.display(), to = %target.display(), "Decompressing export");

        match gunzip(source, target) {
            Ok(0) => {
                error!(file = %target.display(), "Decompressed export is empty, skipping");
                let _ = fs::remove_file(target);
            }
            Ok(bytes) => {
                info!(file = %target.display(), bytes, "Decompressed export");
                decompressed.push(target.clone());
            }
            Err(err) => {
                error!(file = %source.display(), error = %err, "Failed to decompress export");
                let _ = fs::remove_file(target);
            }
        }
    }

    decompressed
}

/// Inflates a gzip file at `source` into `target`, returning the number of
/// bytes written.
pub fn gunzip(source: &Path, target: &Path) -> Result<u64, SnapshotError> {
    let input = File::open(source)?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut output = BufWriter::new(File::create(target)?);
    let written = io::copy(&mut decoder, &mut output)?;
    output.flush()?;
    Ok(written)
}

/// Removes the downloaded archives and their decompressed copies.
pub fn remove_artifacts(snapshots: &[ExportSnapshot]) {
    for snapshot in snapshots {
        for path in [&snapshot.compressed_path, &snapshot.decompressed_path] {
            match fs::remove_file(path) {
                Ok(()) => info!(file = %path.display(), "Removed export artifact"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => error!(file = %path.display(), error = %err, "Failed to remove export artifact"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    fn snapshot_in(dir: &Path, name: &str) -> ExportSnapshot {
        ExportSnapshot {
            url: format!("http://example.org/{name}.gz"),
            compressed_path: dir.join(format!("{name}.gz")),
            decompressed_path: dir.join(name),
            expected_bytes: None,
            actual_bytes: 0,
        }
    }

    fn write_gzip(path: &Path, contents: &[u8]) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(contents).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn decompresses_valid_archive() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot_in(dir.path(), "person_ids_01_01_2024.json");
        write_gzip(&snapshot.compressed_path, b"{\"id\":1,\"popularity\":30.0}\n");

        let outputs = decompress_snapshots(std::slice::from_ref(&snapshot));
        assert_eq!(outputs, vec![snapshot.decompressed_path.clone()]);
        let text = fs::read_to_string(&snapshot.decompressed_path).unwrap();
        assert!(text.contains("\"id\":1"));
    }

    #[test]
    fn zero_byte_output_is_deleted_and_excluded() {
        let dir = tempdir().unwrap();
        let empty = snapshot_in(dir.path(), "empty.json");
        let full = snapshot_in(dir.path(), "full.json");
        write_gzip(&empty.compressed_path, b"");
        write_gzip(&full.compressed_path, b"{\"id\":2,\"popularity\":21.5}\n");

        let outputs = decompress_snapshots(&[empty.clone(), full.clone()]);
        assert_eq!(outputs, vec![full.decompressed_path.clone()]);
        assert!(!empty.decompressed_path.exists());
    }

    #[test]
    fn corrupt_archive_is_skipped() {
        let dir = tempdir().unwrap();
        let corrupt = snapshot_in(dir.path(), "corrupt.json");
        fs::write(&corrupt.compressed_path, b"definitely not gzip").unwrap();

        let outputs = decompress_snapshots(&[corrupt.clone()]);
        assert!(outputs.is_empty());
        assert!(!corrupt.decompressed_path.exists());
    }

    #[test]
    fn remove_artifacts_clears_both_files() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot_in(dir.path(), "person_ids_02_02_2024.json");
        write_gzip(&snapshot.compressed_path, b"{\"id\":3,\"popularity\":99.0}\n");
        decompress_snapshots(std::slice::from_ref(&snapshot));

        remove_artifacts(std::slice::from_ref(&snapshot));
        assert!(!snapshot.compressed_path.exists());
        assert!(!snapshot.decompressed_path.exists());
    }

    #[test]
    fn missing_archive_is_skipped() {
        let dir = tempdir().unwrap();
        let missing = snapshot_in(dir.path(), "missing.json");
        assert!(decompress_snapshots(&[missing]).is_empty());
    }
}
