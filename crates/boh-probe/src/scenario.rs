//! Order scenario harness.
//!
//! Runs the flow steps in order against one page, records each step's
//! duration and outcome in a [`ScenarioReport`], and stops at the first
//! failure. Remaining steps are recorded as skipped and a failure
//! screenshot is handed to the configured [`ArtifactSink`].
//!
//! # Example
//!
//! ```
//! use boh_probe::mock::{Screen, ScriptedPage};
//! use boh_probe::{OrderScenario, ProbeConfig, Step};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().start_paused(true).build().unwrap().block_on(async {
//! let config = ProbeConfig::default();
//! let orders = config.order_page_url();
//! let page = ScriptedPage::new("about:blank").with_screen(Screen::new(orders.as_str()).body("订货单"));
//! let report = OrderScenario::new(&config)
//!     .with_steps([Step::NavigateToOrders])
//!     .run(&page)
//!     .await;
//! assert!(report.passed);
//! # });
//! ```

use crate::artifacts::{ArtifactSink, NoArtifacts};
use crate::config::ProbeConfig;
use crate::driver::PageDriver;
use crate::flows::{
    login, navigate_to_order_page, open_order_detail, select_date_range_and_query, verify_line_items,
    verify_order_detail, verify_order_in_list, verify_tenant,
};
use crate::result::{ProbeError, ProbeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

/// Default scenario name
pub const DEFAULT_SCENARIO_NAME: &str = "order-detail-verification";

// =============================================================================
// STEPS
// =============================================================================

/// One step of the order scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Log in and wait for the redirect
    Login,
    /// Check the tenant name
    VerifyTenant,
    /// Open the order list
    NavigateToOrders,
    /// Set the date range and query
    QueryDateRange,
    /// Find the order row and check its fields
    VerifyOrderList,
    /// Click through to the detail page
    OpenOrderDetail,
    /// Wait for and check the detail header
    VerifyOrderDetail,
    /// Check the line-item table
    VerifyLineItems,
}

impl Step {
    /// Every step, in execution order
    pub const ALL: [Self; 8] = [
        Self::Login,
        Self::VerifyTenant,
        Self::NavigateToOrders,
        Self::QueryDateRange,
        Self::VerifyOrderList,
        Self::OpenOrderDetail,
        Self::VerifyOrderDetail,
        Self::VerifyLineItems,
    ];

    /// Stable name used in logs and reports
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::VerifyTenant => "verify_tenant",
            Self::NavigateToOrders => "navigate_to_orders",
            Self::QueryDateRange => "query_date_range",
            Self::VerifyOrderList => "verify_order_list",
            Self::OpenOrderDetail => "open_order_detail",
            Self::VerifyOrderDetail => "verify_order_detail",
            Self::VerifyLineItems => "verify_line_items",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step completed
    Passed,
    /// Step returned an error
    Failed,
    /// Not run because an earlier step failed
    Skipped,
}

/// Record of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step that ran
    pub step: Step,
    /// Status
    pub status: StepStatus,
    /// Time spent in the step
    #[serde(rename = "duration_ms", with = "crate::wait::millis")]
    pub duration: Duration,
    /// Step outcome (which fallbacks were taken)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
    /// Error message if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    fn passed(step: Step, duration: Duration, outcome: Value) -> Self {
        Self {
            step,
            status: StepStatus::Passed,
            duration,
            outcome: Some(outcome),
            error: None,
        }
    }

    fn failed(step: Step, duration: Duration, error: &ProbeError) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            duration,
            outcome: None,
            error: Some(error.to_string()),
        }
    }

    fn skipped(step: Step) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            duration: Duration::ZERO,
            outcome: None,
            error: None,
        }
    }
}

/// Result of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Environment the run targeted
    pub environment: String,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Total time
    #[serde(rename = "duration_ms", with = "crate::wait::millis")]
    pub duration: Duration,
    /// Per-step records, in execution order
    pub steps: Vec<StepRecord>,
    /// Whether every step passed
    pub passed: bool,
    /// Error of the failing step
    pub error: Option<String>,
    /// Failure artifacts written
    pub artifacts: Vec<PathBuf>,
}

impl ScenarioReport {
    /// Record of `step`, if it was part of the run
    #[must_use]
    pub fn step(&self, step: Step) -> Option<&StepRecord> {
        self.steps.iter().find(|r| r.step == step)
    }

    /// The step that failed
    #[must_use]
    pub fn failed_step(&self) -> Option<Step> {
        self.steps
            .iter()
            .find(|r| r.status == StepStatus::Failed)
            .map(|r| r.step)
    }

    /// Count steps with `status`
    #[must_use]
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|r| r.status == status).count()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} ({} passed, {} failed, {} skipped) in {:.2}s",
            self.name,
            if self.passed { "PASSED" } else { "FAILED" },
            self.count(StepStatus::Passed),
            self.count(StepStatus::Failed),
            self.count(StepStatus::Skipped),
            self.duration.as_secs_f64()
        )
    }

    /// Pretty JSON
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as JSON, creating parent directories
    pub fn save_json(&self, path: &Path) -> ProbeResult<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }
}

// =============================================================================
// SCENARIO
// =============================================================================

/// The order scenario bound to one configuration
#[derive(Debug, Clone)]
pub struct OrderScenario<'a, S = NoArtifacts> {
    name: String,
    config: &'a ProbeConfig,
    sink: S,
    steps: Vec<Step>,
}

impl<'a> OrderScenario<'a> {
    /// All steps, no failure artifacts
    #[must_use]
    pub fn new(config: &'a ProbeConfig) -> Self {
        Self {
            name: DEFAULT_SCENARIO_NAME.to_string(),
            config,
            sink: NoArtifacts,
            steps: Step::ALL.to_vec(),
        }
    }
}

impl<'a, S: ArtifactSink> OrderScenario<'a, S> {
    /// Rename the scenario
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Run only `steps`, in the given order
    #[must_use]
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps = steps.into_iter().collect();
        self
    }

    /// Send failure artifacts to `sink`
    #[must_use]
    pub fn with_artifacts<T: ArtifactSink>(self, sink: T) -> OrderScenario<'a, T> {
        OrderScenario {
            name: self.name,
            config: self.config,
            sink,
            steps: self.steps,
        }
    }

    /// Scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps that will run
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step against `page`.
    ///
    /// Never returns an error; the outcome is in the report.
    pub async fn run<P: PageDriver>(&self, page: &P) -> ScenarioReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let browser = &self.config.browser;
        if let Err(e) = page
            .set_viewport(browser.viewport_width, browser.viewport_height)
            .await
        {
            warn!(error = %e, "could not set viewport");
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        let mut failure: Option<ProbeError> = None;
        for &step in &self.steps {
            if failure.is_some() {
                steps.push(StepRecord::skipped(step));
                continue;
            }
            let step_start = Instant::now();
            let result = self
                .run_step(step, page)
                .instrument(info_span!("step", name = step.name()))
                .await;
            let elapsed = step_start.elapsed();
            match result {
                Ok(outcome) => {
                    info!(step = step.name(), elapsed_ms = elapsed.as_millis() as u64, "step passed");
                    steps.push(StepRecord::passed(step, elapsed, outcome));
                }
                Err(e) => {
                    error!(step = step.name(), severity = ?e.severity(), error = %e, "step failed");
                    steps.push(StepRecord::failed(step, elapsed, &e));
                    failure = Some(e);
                }
            }
        }

        let artifacts = if failure.is_some() {
            self.capture_failure(page).await
        } else {
            Vec::new()
        };
        let report = ScenarioReport {
            name: self.name.clone(),
            environment: self.config.profile.environment.to_string(),
            started_at,
            duration: start.elapsed(),
            steps,
            passed: failure.is_none(),
            error: failure.map(|e| e.to_string()),
            artifacts,
        };
        info!(summary = %report.summary(), "scenario finished");
        report
    }

    async fn run_step<P: PageDriver>(&self, step: Step, page: &P) -> ProbeResult<Value> {
        let config = self.config;
        match step {
            Step::Login => to_value(login(page, config).await?),
            Step::VerifyTenant => to_value(verify_tenant(page, config).await?),
            Step::NavigateToOrders => to_value(navigate_to_order_page(page, config).await?),
            Step::QueryDateRange => {
                to_value(select_date_range_and_query(page, config, &config.case.date_range).await?)
            }
            Step::VerifyOrderList => to_value(verify_order_in_list(page, config).await?),
            Step::OpenOrderDetail => to_value(open_order_detail(page, config).await?),
            Step::VerifyOrderDetail => to_value(verify_order_detail(page, config).await?),
            Step::VerifyLineItems => to_value(verify_line_items(page, config).await?),
        }
    }

    async fn capture_failure<P: PageDriver>(&self, page: &P) -> Vec<PathBuf> {
        let png = match page.screenshot().await {
            Ok(png) => png,
            Err(e) => {
                warn!(error = %e, "failure screenshot unavailable");
                return Vec::new();
            }
        };
        self.sink.store_failure(&self.name, &png).unwrap_or_else(|e| {
            warn!(error = %e, "could not store failure screenshot");
            Vec::new()
        })
    }
}

fn to_value<T: Serialize>(outcome: T) -> ProbeResult<Value> {
    Ok(serde_json::to_value(outcome)?)
}
