//! CLI command definitions

use crate::config::ColorChoice;
use boh_probe::Environment;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Default directory for reports and failure screenshots
pub const DEFAULT_OUTPUT_DIR: &str = "target/boh-probe";

/// boh-probe: resilient browser checks for back-office order pages
#[derive(Parser, Debug)]
#[command(name = "boh-probe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the order-detail scenario in a browser
    Run(RunArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),
}

/// Where the configuration comes from
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Deployment to target (overrides ENV and the config file)
    #[arg(long, value_enum)]
    pub env: Option<EnvArg>,

    /// YAML file overriding built-in settings
    #[arg(long, value_name = "YAML")]
    pub config: Option<PathBuf>,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration source
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory for report.json and failure screenshots
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Show the browser window even when CI=true
    #[arg(long)]
    pub headed: bool,

    /// Chromium executable
    #[arg(long, value_name = "PATH")]
    pub chromium_path: Option<PathBuf>,

    /// Print the JSON report to stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration source
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the full configuration (password masked)
    #[arg(long)]
    pub show: bool,

    /// Format for --show
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: ConfigFormat,
}

/// Deployment argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvArg {
    /// QA deployment
    Test,
    /// Production deployment
    #[value(alias = "prod")]
    Production,
}

impl From<EnvArg> for Environment {
    fn from(arg: EnvArg) -> Self {
        match arg {
            EnvArg::Test => Self::Test,
            EnvArg::Production => Self::Production,
        }
    }
}

/// Output format of `config --show`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// YAML, the config file format
    #[default]
    Yaml,
    /// Pretty JSON
    Json,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorArg {
    /// Color when stdout is a terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
