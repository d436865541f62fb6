use anyhow::Result;
use clap::Parser;
use tracing::error;

use releasedates::args::{Args, Command};
use releasedates::sqlite::default_db_path;
use releasedates::utils::{setup_logging, validate_args};
use releasedates::{analysis, fetch};

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    validate_args(&args)?;

    let db_path = args.db.clone().unwrap_or_else(default_db_path);

    let outcome = match &args.command {
        Command::Fetch(fetch_args) => fetch::fetch_release_dates(fetch_args, &db_path)
            .map(|result| fetch::print_fetch_results(&result)),
        Command::Analyze(analyze_args) => analysis::analyze_release_history(&db_path)
            .map(|result| analysis::print_analysis_results(&result, analyze_args)),
        Command::DoublingAt(doubling_args) => fetch::fetch_doubling_at(doubling_args)
            .map(|result| fetch::print_doubling_at(&result)),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
