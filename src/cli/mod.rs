//! Command-line interface definitions.

pub mod probe;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ballast - reconnection, throttling and caching for trading backends.
#[derive(Parser, Debug)]
#[command(name = "ballast")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a configuration file and print a summary
    Validate(ConfigPathArg),

    /// Check that the configured backing store is reachable
    Probe(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}
