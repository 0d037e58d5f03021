//! Command handlers

pub mod config;
pub mod run;

use crate::commands::TargetArgs;
use crate::error::CliResult;
use boh_probe::ProbeConfig;

/// Resolve the run configuration with `lookup` standing in for the
/// process environment
pub fn resolve_config_with<F>(target: &TargetArgs, lookup: F) -> CliResult<ProbeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config = ProbeConfig::resolve_with(lookup, target.config.as_deref(), target.env.map(Into::into))?;
    Ok(config)
}

/// Resolve the run configuration once, from flags, file and environment
pub fn resolve_config(target: &TargetArgs) -> CliResult<ProbeConfig> {
    resolve_config_with(target, |key| std::env::var(key).ok())
}
