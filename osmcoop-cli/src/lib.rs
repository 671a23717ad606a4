//! Command-line interface turning OpenStreetMap change files into cooperative
//! challenge tasks.
#![forbid(unsafe_code)]

use std::str::FromStr;

use clap::{Parser, Subcommand};
use log::LevelFilter;

mod changes;
mod config;
mod error;
mod input;
mod output;
mod session;
mod tags;

pub use error::CliError;

use changes::ChangesArgs;
use tags::TagsArgs;

pub(crate) const ARG_OUT: &str = "out";
pub(crate) const ARG_API_URL: &str = "api-url";
pub(crate) const ARG_THROTTLE_MS: &str = "throttle-ms";
pub(crate) const ENV_TAGS_INPUTS: &str = "OSMCOOP_CMDS_TAGS_INPUTS";
pub(crate) const ENV_CHANGES_INPUTS: &str = "OSMCOOP_CMDS_CHANGES_INPUTS";

/// Run the osmcoop CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(&cli.log_level);
    match cli.command {
        Command::Tags(args) => tags::run_tags(args),
        Command::Changes(args) => changes::run_changes(args),
    }
}

fn init_logging(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {level}. Using 'warn' instead.");
        LevelFilter::Warn
    });
    // Keep an already installed logger.
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(filter)
        .try_init();
}

#[derive(Debug, Parser)]
#[command(
    name = "osmcoop",
    about = "Generate cooperative challenge tasks from OpenStreetMap change files",
    version
)]
struct Cli {
    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "warn", value_name = "level")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Tasks with tag-only fixes.
    Tags(TagsArgs),
    /// Tasks carrying an OSMChange file.
    Changes(ChangesArgs),
}

#[cfg(test)]
mod tests;
