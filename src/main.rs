use apistream::cli::{run_cli, Cli, Outcome};
use apistream::telemetry::{init_logging_with_config, LogConfig};
use clap::Parser;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    // stdout carries the command's JSON; logs go to stderr
    let log_config = LogConfig {
        stderr: true,
        async_logging: false,
        ..LogConfig::from_env()
    };
    let _guard = init_logging_with_config(&log_config)?;

    let outcome = run_cli(cli, &mut std::io::stdout().lock())?;
    Ok(match outcome {
        Outcome::Accepted => ExitCode::SUCCESS,
        Outcome::Rejected => ExitCode::from(1),
    })
}
