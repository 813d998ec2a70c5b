use anyhow::{Context, Result, bail};
use clap::Parser;
use reel_cli::cli_args::{Cli, Command, ConfigCommand, IngestArgs, RefreshArgs, SourceMode};
use reel_core::config::{FileConfig, RuntimeOverrides};
use reel_core::{
    ConfigSource, IngestReport, IngestSource, LoggingDestination, apply_runtime_overrides,
    config_path, init_logging, load_config, run_ingest, save_config,
};
use tracing::warn;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let destination = match cli.command {
        Command::Config(_) => LoggingDestination::StderrOnly,
        _ => LoggingDestination::FileAndStderr,
    };
    if let Err(err) = init_logging(destination) {
        eprintln!("Warning: structured logging unavailable: {err}");
    }

    dispatch(cli)
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Rank(args) => {
            let summary = popularity_snapshot::run(args).context("ranking failed")?;
            println!(
                "Candidate list written to {} ({} of {} snapshots usable, {} candidates)",
                summary.candidates_path.display(),
                summary.usable_snapshots,
                summary.planned_snapshots,
                summary.candidates
            );
            Ok(())
        }
        Command::Ingest(args) => run_ingest_command(args),
        Command::Refresh(args) => run_refresh(args),
        Command::Config(cmd) => handle_config_command(cmd),
    }
}

fn run_ingest_command(args: IngestArgs) -> Result<()> {
    let config = effective_config(&args.to_runtime_overrides());
    let source = match args.mode {
        SourceMode::Candidates => IngestSource::from_candidate_file(&config.ingest.candidates_path())?,
        SourceMode::Listing => IngestSource::Listing,
    };
    let report = run_ingest(&config, source).context("ingestion failed")?;
    print_report(&report);
    Ok(())
}

fn run_refresh(args: RefreshArgs) -> Result<()> {
    let summary = popularity_snapshot::run(args.rank).context("ranking failed")?;
    if summary.candidates == 0 {
        warn!("Candidate list is empty; the database will be cleared");
    }

    let mut overrides = args.catalog.to_runtime_overrides();
    overrides.candidates_path = Some(summary.candidates_path.to_string_lossy().into_owned());
    let config = effective_config(&overrides);

    let source = IngestSource::from_candidate_file(&summary.candidates_path)?;
    let report = run_ingest(&config, source).context("ingestion failed")?;
    print_report(&report);
    Ok(())
}

/// Defaults, then config.toml, then the environment, then CLI flags.
fn effective_config(cli_overrides: &RuntimeOverrides) -> FileConfig {
    let load = load_config();
    let mut warnings = load.warnings;
    let mut config = load.config;

    apply_runtime_overrides(&mut config, &RuntimeOverrides::from_env(), &mut warnings);
    if !cli_overrides.is_empty() {
        apply_runtime_overrides(&mut config, cli_overrides, &mut warnings);
    }

    for warning in warnings {
        warn!("{warning}");
    }
    config
}

fn print_report(report: &IngestReport) {
    println!(
        "Database {} refreshed: {} actors, {} movies, {} roles ({} actors skipped, {} requests)",
        report.database_path.display(),
        report.counts.actors,
        report.counts.movies,
        report.counts.roles,
        report.stats.actors_skipped,
        report.stats.requests
    );
}

fn handle_config_command(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let load = load_config();
            for warning in &load.warnings {
                eprintln!("Warning: {warning}");
            }
            let mut config = load.config;
            if config.catalog.api_key.is_some() {
                config.catalog.api_key = Some("********".to_string());
            }
            let origin = match load.source {
                ConfigSource::File => "file",
                ConfigSource::Default => "defaults",
            };
            println!("# {} ({origin})", config_path().display());
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommand::Init { force } => {
            let path = config_path();
            if path.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", path.display());
            }
            let written = save_config(&FileConfig::default())?;
            println!("Wrote {}", written.display());
            Ok(())
        }
    }
}
