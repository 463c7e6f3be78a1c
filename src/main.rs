//! `dupsweep` is a command-line utility for finding and removing duplicate files.
//!
//! # Usage
//!
//! Scan two trees, three levels deep, considering only JPEG files:
//!
//! ```sh
//! dupsweep --dir ~/photos ~/backup --depth 3 --mask '\.jpe?g$'
//! ```
//!
//! See what would be removed without touching anything:
//!
//! ```sh
//! dupsweep --dir ~/photos --dry-run
//! ```

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use human_bytes::human_bytes;
use log::error;

use dupsweep::cancel::{install_ctrlc_handler, EXIT_CODE_INTERRUPTED};
use dupsweep::config::Config;
use dupsweep::error::error_chain;
use dupsweep::logging::init_logging;
use dupsweep::policy::RemovalMode;
use dupsweep::{remove_duplicates, Error, Report};

use crate::cli::Cli;

const EXIT_CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = match Config::from_settings(cli.settings()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", error_chain(&err));
            error!("Invalid arguments, nothing was scanned");
            return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
        }
    };

    let cancel = install_ctrlc_handler().context("cannot install Ctrl+C handler")?;

    match remove_duplicates(&config, &cancel) {
        Ok(report) => {
            print_summary(&report, config.removal);
            Ok(ExitCode::SUCCESS)
        }
        Err(Error::Cancelled) => {
            error!("Interrupted, stopping before the next file");
            Ok(ExitCode::from(EXIT_CODE_INTERRUPTED as u8))
        }
        Err(Error::Config(err)) => {
            error!("{}", error_chain(&err));
            Ok(ExitCode::from(EXIT_CONFIG_ERROR))
        }
    }
}

fn print_summary(report: &Report, removal: RemovalMode) {
    let verb = match removal {
        RemovalMode::Remove => "removed",
        RemovalMode::DryRun => "would be removed",
    };
    println!("\n{} files scanned, {} candidates.", report.files_seen, report.candidates);
    println!("{} duplicate groups found.", report.groups.len());
    println!(
        "{} files {}, {} reclaimed.",
        report.removed.len(),
        verb,
        human_bytes(report.bytes_reclaimed as f64)
    );
    if !report.errors.is_empty() {
        println!("{} files could not be processed, see the log above.", report.errors.len());
    }
}
