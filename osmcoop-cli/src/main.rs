//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use osmcoop_cli::CliError;

fn main() {
    if let Err(err) = osmcoop_cli::run() {
        if let CliError::ArgumentParsing(parse_error) = &err {
            parse_error.exit();
        }
        eprintln!("osmcoop: {err}");
        std::process::exit(1);
    }
}
