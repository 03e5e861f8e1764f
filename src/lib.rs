pub mod cli;
pub mod config;
pub mod logging;
pub mod model;
pub mod output;
pub mod providers;
pub mod reply;
pub mod search;
pub mod value;

use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing::{debug, error};

use cli::Args;
use config::Config;
use output::EXIT_SETUP_ERROR;

pub async fn run() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let args = Args::parse();
    execute(&args).await
}

/// Resolves configuration, performs the search, and prints the result.
/// Setup problems go to stderr with exit code 2 and nothing on stdout.
pub async fn execute(args: &Args) -> ExitCode {
    let cfg = match Config::resolve(args) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::from(EXIT_SETUP_ERROR);
        }
    };

    let output = search::run_search(&cfg, &args.query).await;
    debug!(ok = output.is_ok(), "search finished");
    if let Err(err) = output.write_to(&mut io::stdout().lock()) {
        error!(error = %err, "failed to write search result");
        return ExitCode::FAILURE;
    }
    output.exit_code()
}
