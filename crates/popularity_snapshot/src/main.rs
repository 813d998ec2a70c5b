use clap::Parser;
use tracing_subscriber::EnvFilter;

use popularity_snapshot::config::CliArgs;

/// Rank people from the bulk popularity exports.
#[derive(Debug, Parser)]
#[command(author, version, about = "Build the ranked actor candidate list from popularity exports")]
struct Cli {
    #[command(flatten)]
    args: CliArgs,
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match popularity_snapshot::run(cli.args) {
        Ok(summary) => println!(
            "Candidate list written to {} ({} of {} snapshots usable, {} candidates)",
            summary.candidates_path.display(),
            summary.usable_snapshots,
            summary.planned_snapshots,
            summary.candidates
        ),
        Err(err) => {
            eprintln!("popularity snapshot failed: {}", err);
            std::process::exit(1);
        }
    }
}
