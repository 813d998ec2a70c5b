use std::path::PathBuf;

use clap::Parser;
use reel_cli::cli_args::{Cli, Command, ConfigCommand, IngestArgs, SourceMode};
use reel_core::config::{FileConfig, RuntimeOverrides, apply_runtime_overrides};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("reel").chain(args.iter().copied()))
        .expect("arguments parse")
}

#[test]
fn ingest_defaults_to_candidate_mode() {
    let cli = parse(&["ingest"]);
    let Command::Ingest(args) = cli.command else {
        panic!("expected ingest");
    };
    assert_eq!(args.mode, SourceMode::Candidates);
    assert!(args.to_runtime_overrides().is_empty());
}

#[test]
fn ingest_flags_become_overrides() {
    let cli = parse(&[
        "ingest",
        "--mode",
        "listing",
        "--database",
        "/tmp/movies.db",
        "--page-cap",
        "5",
        "--pages-per-batch",
        "2",
        "--delay-ms",
        "0",
        "--candidates",
        "ids.txt",
    ]);
    let Command::Ingest(args) = cli.command else {
        panic!("expected ingest");
    };
    assert_eq!(args.mode, SourceMode::Listing);

    let overrides = args.to_runtime_overrides();
    assert_eq!(overrides.database_path.as_deref(), Some("/tmp/movies.db"));
    assert_eq!(overrides.page_cap, Some(5));
    assert_eq!(overrides.pages_per_batch, Some(2));
    assert_eq!(overrides.request_delay_ms, Some(0));
    assert_eq!(overrides.candidates_path.as_deref(), Some("ids.txt"));
}

#[test]
fn cli_overrides_win_over_file_values() {
    let mut config = FileConfig::default();
    let mut warnings = Vec::new();

    let from_env = RuntimeOverrides {
        api_key: Some("env-key".to_string()),
        database_path: Some("env.db".to_string()),
        ..RuntimeOverrides::default()
    };
    apply_runtime_overrides(&mut config, &from_env, &mut warnings);

    let args = IngestArgs {
        catalog: reel_cli::cli_args::CatalogArgs {
            database: Some("cli.db".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    apply_runtime_overrides(&mut config, &args.to_runtime_overrides(), &mut warnings);

    assert!(warnings.is_empty());
    assert_eq!(config.catalog.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.ingest.database_path, "cli.db");
}

#[test]
fn rank_uses_archive_defaults() {
    let cli = parse(&["rank", "--keep-archives"]);
    let Command::Rank(args) = cli.command else {
        panic!("expected rank");
    };
    assert!(args.keep_archives);
    assert_eq!(args.archive_dir, PathBuf::from("archives"));
    assert_eq!(args.candidates, PathBuf::from("popular_actors.txt"));
}

#[test]
fn refresh_accepts_rank_and_catalog_flags() {
    let cli = parse(&["refresh", "--candidates", "out.txt", "--database", "db.sqlite"]);
    let Command::Refresh(args) = cli.command else {
        panic!("expected refresh");
    };
    assert_eq!(args.rank.candidates, PathBuf::from("out.txt"));
    assert_eq!(args.catalog.database.as_deref(), Some("db.sqlite"));
}

#[test]
fn config_init_takes_force() {
    let cli = parse(&["config", "init", "--force"]);
    assert!(matches!(
        cli.command,
        Command::Config(ConfigCommand::Init { force: true })
    ));
}

#[test]
fn unknown_mode_is_rejected() {
    assert!(Cli::try_parse_from(["reel", "ingest", "--mode", "everything"]).is_err());
}

#[test]
fn zero_batch_override_is_ignored_with_warning() {
    let mut config = FileConfig::default();
    let mut warnings = Vec::new();
    let overrides = RuntimeOverrides {
        pages_per_batch: Some(0),
        ..RuntimeOverrides::default()
    };
    apply_runtime_overrides(&mut config, &overrides, &mut warnings);
    assert_eq!(config.ingest.pages_per_batch, 10);
    assert_eq!(warnings.len(), 1);
}
