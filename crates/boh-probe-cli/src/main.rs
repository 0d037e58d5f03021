//! boh-probe CLI: order-detail checks against the back office
//!
//! ## Usage
//!
//! ```bash
//! boh-probe run                          # Run against ENV (default: test)
//! boh-probe run --env production --json  # Print the JSON report
//! boh-probe config --show                # Resolved config, password masked
//! ```

use boh_probe_cli::{handlers, logging, Cli, CliConfig, CliResult, Commands, Verbosity};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init_logging(config.verbosity);

    match cli.command {
        Commands::Run(args) => handlers::run::execute_run(&config, &args),
        Commands::Config(args) => handlers::config::execute_config(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
}
