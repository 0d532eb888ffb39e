//! Codeflow host entry point.

use std::{process, str::FromStr};

use clap::Parser;
use log::{debug, error, info, LevelFilter};

use codeflow_host::Args;

fn main() {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            args.log_level
        );
        LevelFilter::Warn
    });

    // stdout carries the renderer protocol; logs stay on stderr.
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .target(env_logger::Target::Stderr)
        .init();

    info!(log_level:?; "Starting Codeflow host");
    debug!(args:?; "Parsed arguments");

    if let Err(err) = codeflow_host::run(&args) {
        error!("{err}");
        process::exit(1);
    }
}
