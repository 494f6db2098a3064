pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod report;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::RunConfig;
use crate::error::RunError;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::emit_error(cli.output, e.exit_code_num(), &e.to_string());
            e.exit_code()
        }
    }
}

fn execute(cli: &Cli) -> Result<(), RunError> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    config.apply_cli(cli);

    let report = report::run(&cli.module, config, !cli.no_graphics)?;
    output::emit(cli.output, &report)?;
    Ok(())
}
