//! Run command handler

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use boh_probe::ProbeConfig;
use std::path::PathBuf;

/// Report file written below the output directory
pub const REPORT_FILE: &str = "report.json";

/// Apply the run flags to the resolved configuration
#[must_use]
pub fn apply_run_flags(mut config: ProbeConfig, args: &RunArgs) -> ProbeConfig {
    if args.headed {
        config.browser.headless = false;
    }
    if let Some(path) = &args.chromium_path {
        config.browser.chromium_path = Some(path.clone());
    }
    config
}

/// Where the JSON report goes
#[must_use]
pub fn report_path(args: &RunArgs) -> PathBuf {
    args.output_dir.join(REPORT_FILE)
}

/// Execute the run command
#[cfg(not(feature = "browser"))]
pub fn execute_run(_cli: &CliConfig, _args: &RunArgs) -> CliResult<()> {
    Err(crate::error::CliError::browser_disabled())
}

/// Execute the run command
#[cfg(feature = "browser")]
pub fn execute_run(cli: &CliConfig, args: &RunArgs) -> CliResult<()> {
    use crate::error::CliError;
    use crate::output::ProgressReporter;

    let config = apply_run_flags(super::resolve_config(&args.target)?, args);
    let reporter = ProgressReporter::new(cli.color.should_color(), cli.verbosity.is_quiet());
    reporter.info(&format!(
        "{} against {}",
        config.profile.environment,
        config.order_page_url()
    ));

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(browser::run_scenario(&config, &args.output_dir))?;

    let path = report_path(args);
    report.save_json(&path)?;
    reporter.report(&report);
    reporter.info(&format!("report: {}", path.display()));
    if args.json {
        println!("{}", report.to_json()?);
    }

    if report.passed {
        return Ok(());
    }
    Err(CliError::ScenarioFailed {
        step: report
            .failed_step()
            .map_or_else(|| "unknown step".to_string(), |step| step.to_string()),
        message: report.error.unwrap_or_default(),
    })
}

#[cfg(feature = "browser")]
mod browser {
    use crate::error::CliResult;
    use boh_probe::{BrowserSession, OrderScenario, ProbeConfig, ScenarioReport, ScreenshotOnFailure};
    use std::path::Path;
    use tracing::warn;

    pub(super) async fn run_scenario(config: &ProbeConfig, output_dir: &Path) -> CliResult<ScenarioReport> {
        let session = BrowserSession::launch(&config.browser).await?;
        let page = session.new_page().await?;
        let report = OrderScenario::new(config)
            .with_artifacts(ScreenshotOnFailure::new(output_dir))
            .run(&page)
            .await;
        if let Err(e) = session.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::TargetArgs;

    fn args(headed: bool) -> RunArgs {
        RunArgs {
            target: TargetArgs::default(),
            output_dir: PathBuf::from("out"),
            headed,
            chromium_path: Some(PathBuf::from("/opt/chromium")),
            json: false,
        }
    }

    #[test]
    fn test_headed_overrides_ci() {
        let mut config = ProbeConfig::default();
        config.browser.headless = true;
        let config = apply_run_flags(config, &args(true));
        assert!(!config.browser.headless);
        assert_eq!(config.browser.chromium_path, Some(PathBuf::from("/opt/chromium")));
    }

    #[test]
    fn test_headless_kept_without_flag() {
        let mut config = ProbeConfig::default();
        config.browser.headless = true;
        assert!(apply_run_flags(config, &args(false)).browser.headless);
    }

    #[test]
    fn test_report_path() {
        assert_eq!(report_path(&args(false)), PathBuf::from("out/report.json"));
    }

    #[cfg(not(feature = "browser"))]
    #[test]
    fn test_run_requires_browser_feature() {
        let err = execute_run(&CliConfig::default(), &args(false)).err();
        assert!(matches!(err, Some(crate::error::CliError::FeatureDisabled { .. })));
    }
}
