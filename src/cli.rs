//! Command line parsing for the node binary

use std::path::PathBuf;
use thiserror::Error;

/// Options for a normal run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Config file; defaults are used when absent
    pub config_path: Option<PathBuf>,
    /// Overrides the configured and `PORT` port
    pub port: Option<u16>,
    /// Run a single cycle, print it and exit
    pub once: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Run(RunOptions),
    Help,
    Version,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CliError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Parse arguments, excluding the program name
pub fn parse_args<I>(args: I) -> Result<CliCommand, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut options = RunOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliCommand::Help),
            "--version" | "-v" => return Ok(CliCommand::Version),
            "--once" => options.once = true,
            "--config" | "-c" => {
                let path = args.next().ok_or(CliError::MissingValue("--config"))?;
                options.config_path = Some(PathBuf::from(path));
            }
            "--port" | "-p" => {
                let value = args.next().ok_or(CliError::MissingValue("--port"))?;
                let port = value.parse().map_err(|_| CliError::InvalidPort(value))?;
                options.port = Some(port);
            }
            _ => return Err(CliError::UnknownArgument(arg)),
        }
    }

    Ok(CliCommand::Run(options))
}

pub fn print_help() {
    println!("Usage: voltmon [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config PATH   Load node configuration from a JSON file");
    println!("  -p, --port PORT     Listen on PORT (overrides config and $PORT)");
    println!("      --once          Run one measurement, print it and exit");
    println!("  -v, --version       Show version");
    println!("  -h, --help          Show this help");
    println!();
    println!("Examples:");
    println!("  voltmon --config node.json");
    println!("  voltmon --once");
}
