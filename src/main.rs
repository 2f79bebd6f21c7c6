/// Command-line entry point for the spray-advisory pipeline.
///
/// Usage:
///   spraycast_service <ingest|infer|notify> [--config PATH]
///
/// Each subcommand runs one job to completion and prints its structured
/// outcome as JSON. The process exits non-zero only when the job itself
/// failed (status >= 500), so the scheduler can distinguish failures from
/// skips.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use spraycast_service::config::{self, DEFAULT_CONFIG_PATH};
use spraycast_service::jobs::{self, JobOutcome};
use spraycast_service::logging::{self, DataSource, LogLevel};

fn usage() -> ExitCode {
    eprintln!("Usage: spraycast_service <ingest|infer|notify> [--config PATH]");
    ExitCode::from(2)
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    logging::init_logger(LogLevel::Info, None);

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(job) = args.first() else {
        return usage();
    };

    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(path) => PathBuf::from(path),
            None => return usage(),
        },
        None => PathBuf::from(DEFAULT_CONFIG_PATH),
    };

    let config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            logging::error(DataSource::System, Some(job.as_str()), &err.to_string());
            return ExitCode::FAILURE;
        }
    };

    logging::info(DataSource::System, Some(job.as_str()), "starting");
    let outcome = match job.as_str() {
        "ingest" => jobs::run_ingest(&config),
        "infer" => jobs::run_infer(&config),
        "notify" => jobs::run_notify(&config),
        _ => return usage(),
    };

    print_outcome(&outcome);
    if outcome.status >= 500 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_outcome(outcome: &JobOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(json) => println!("{}", json),
        Err(_) => println!("{:?}", outcome),
    }
}
