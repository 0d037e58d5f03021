//! boh-probe CLI library
//!
//! Command-line front end for the boh-probe order scenario: resolves the
//! run configuration once, sets up logging, drives a real browser and
//! reports each step on the console.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, ConfigFormat, EnvArg, RunArgs, TargetArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{Mark, ProgressReporter};
