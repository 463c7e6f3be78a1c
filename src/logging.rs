//! Logging setup: the `log` facade with an `env_logger` backend.
//!
//! `RUST_LOG` wins when it is set. Otherwise `--quiet` shows errors only, the
//! default is info (one line per removed file), `-v` is debug and `-vv` trace.

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initializes the global logger. Call once, before anything logs.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(move |buf, record| {
        let level = buf.default_styled_level(record.level());
        if verbose > 0 {
            let timestamp = buf.timestamp_seconds();
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{:<5} {}", level, record.args())
        }
    });

    builder.init();
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
