use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use popularity_snapshot::acquire::plan_exports;
use popularity_snapshot::config::{Paths, Tunables};
use popularity_snapshot::decompress::decompress_snapshots;
use popularity_snapshot::rank_exports;
use tempfile::tempdir;

fn write_gzip(path: &Path, contents: &str) {
    let mut encoder = GzEncoder::new(File::create(path).expect("create"), Compression::fast());
    encoder.write_all(contents.as_bytes()).expect("write");
    encoder.finish().expect("finish");
}

fn tunables(candidate_count: usize) -> Tunables {
    Tunables {
        export_root: "http://exports.invalid/p/exports".to_string(),
        snapshot_count: 3,
        days_between_exports: 28,
        popularity_cutoff: 20.0,
        candidate_count,
        download_timeout_secs: 7,
        transfer_timeout_secs: 600,
    }
}

fn paths(dir: &Path) -> Paths {
    Paths {
        archive_dir: dir.to_path_buf(),
        averages: dir.join("average_popularity.json"),
        candidates: dir.join("popular_actors.txt"),
    }
}

#[test]
fn pipeline_ranks_with_fixed_denominator_and_skips_empty_export() {
    let temp = tempdir().expect("tempdir");
    let today = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).expect("date");
    let tunables = tunables(2);
    let planned = plan_exports(today, &tunables, temp.path());

    write_gzip(
        &planned[0].compressed_path,
        "{\"id\":1,\"popularity\":90.0}\n{\"id\":2,\"popularity\":30.0}\n{\"id\":3,\"popularity\":2.0}\n",
    );
    write_gzip(
        &planned[1].compressed_path,
        "{\"id\":2,\"popularity\":30.0}\nthis line is garbage\n{\"id\":4,\"popularity\":45.0}\n",
    );
    write_gzip(&planned[2].compressed_path, "");

    let usable = decompress_snapshots(&planned);
    assert_eq!(usable.len(), 2, "empty export must be excluded");
    assert!(!planned[2].decompressed_path.exists());

    let paths = paths(temp.path());
    let summary = rank_exports(&usable, &tunables, &paths).expect("rank");
    assert_eq!(summary.ranked_ids, 3);
    assert_eq!(summary.candidates, 2);

    // id 1 -> 30.0, id 2 -> 20.0, id 4 -> 15.0
    let candidates = fs::read_to_string(&paths.candidates).expect("read candidates");
    assert_eq!(candidates, "1\n2\n");

    let averages = fs::read_to_string(&paths.averages).expect("read averages");
    assert!(averages.contains("{\"id\":2,\"average_popularity\":20.0}"));
    assert!(!averages.contains("\"id\":3"));
}

#[test]
fn no_usable_exports_still_produce_empty_outputs() {
    let temp = tempdir().expect("tempdir");
    let paths = paths(temp.path());

    let summary = rank_exports(&[], &tunables(1_000), &paths).expect("rank");
    assert_eq!(summary.usable_snapshots, 0);
    assert_eq!(summary.candidates, 0);
    assert_eq!(fs::read_to_string(&paths.averages).expect("averages"), "");
    assert_eq!(fs::read_to_string(&paths.candidates).expect("candidates"), "");
}
