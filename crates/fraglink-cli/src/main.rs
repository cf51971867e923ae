//! fraglink CLI entry point.

use std::{process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use fraglink_cli::{Args, FATAL_EXIT_CODE, error_adapter::to_reportables};

fn main() {
    // Install miette's pretty panic hook early for better panic reports
    miette::set_panic_hook();

    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            args.log_level
        );
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!(log_level:?; "Starting fraglink");
    debug!(args:?; "Parsed arguments");

    match fraglink_cli::run(&args) {
        Ok(outcome) => {
            eprintln!("\n{}", outcome.banner());
            info!(outcome:?; "Completed");
            process::exit(outcome.exit_code());
        }
        Err(err) => {
            let reporter = miette::GraphicalReportHandler::new();

            for reportable in to_reportables(&err) {
                let mut writer = String::new();
                if reporter.render_report(&mut writer, &reportable).is_err() {
                    writer = reportable.to_string();
                }
                error!("{writer}");
            }

            process::exit(FATAL_EXIT_CODE);
        }
    }
}
