//! Console step lines and run summary

use boh_probe::{ScenarioReport, StepRecord, StepStatus};
use console::{style, Style, Term};

/// Line prefix kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Passed
    Pass,
    /// Failed
    Fail,
    /// Warning or skipped
    Warn,
    /// Information
    Info,
}

impl Mark {
    /// Prefix text
    #[must_use]
    pub fn prefix(self, use_color: bool) -> String {
        if !use_color {
            return match self {
                Self::Pass => "PASS",
                Self::Fail => "FAIL",
                Self::Warn => "WARN",
                Self::Info => "INFO",
            }
            .to_string();
        }
        match self {
            Self::Pass => style("✓").green().bold().to_string(),
            Self::Fail => style("✗").red().bold().to_string(),
            Self::Warn => style("⚠").yellow().bold().to_string(),
            Self::Info => style("ℹ").blue().bold().to_string(),
        }
    }
}

/// Progress reporter for a scenario run
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Format one line
    #[must_use]
    pub fn line(&self, mark: Mark, message: &str) -> String {
        format!("{} {message}", mark.prefix(self.use_color))
    }

    fn emit(&self, mark: Mark, message: &str) {
        // Failures print even in quiet mode
        if self.quiet && mark != Mark::Fail {
            return;
        }
        let _ = self.term.write_line(&self.line(mark, message));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        self.emit(Mark::Pass, message);
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        self.emit(Mark::Fail, message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        self.emit(Mark::Warn, message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        self.emit(Mark::Info, message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Text of a step line
    #[must_use]
    pub fn step_message(record: &StepRecord) -> String {
        match (&record.status, &record.error) {
            (StepStatus::Failed, Some(error)) => format!("{} ({} ms): {error}", record.step, record.duration.as_millis()),
            (StepStatus::Skipped, _) => format!("{} skipped", record.step),
            _ => format!("{} ({} ms)", record.step, record.duration.as_millis()),
        }
    }

    /// Print one step line
    pub fn step(&self, record: &StepRecord) {
        let message = Self::step_message(record);
        match record.status {
            StepStatus::Passed => self.success(&message),
            StepStatus::Failed => self.failure(&message),
            StepStatus::Skipped => self.warning(&message),
        }
    }

    /// Print every step, the artifacts and the summary
    pub fn report(&self, report: &ScenarioReport) {
        self.header(&report.name);
        for record in &report.steps {
            self.step(record);
        }
        for artifact in &report.artifacts {
            self.info(&format!("artifact: {}", artifact.display()));
        }
        self.summary(report);
    }

    /// Print the run summary
    pub fn summary(&self, report: &ScenarioReport) {
        if self.quiet && report.passed {
            return;
        }
        let _ = self.term.write_line("");
        let text = report.summary();
        let line = if self.use_color {
            let status = if report.passed {
                Style::new().green().bold()
            } else {
                Style::new().red().bold()
            };
            status.apply_to(text).to_string()
        } else {
            text
        };
        let _ = self.term.write_line(&line);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use boh_probe::Step;
    use serde_json::json;

    fn record(value: serde_json::Value) -> StepRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plain_prefixes() {
        assert_eq!(Mark::Pass.prefix(false), "PASS");
        assert_eq!(Mark::Fail.prefix(false), "FAIL");
        assert_eq!(Mark::Warn.prefix(false), "WARN");
        assert_eq!(Mark::Info.prefix(false), "INFO");
    }

    #[test]
    fn test_colored_prefix_keeps_symbol() {
        assert!(Mark::Pass.prefix(true).contains('✓'));
        assert!(Mark::Fail.prefix(true).contains('✗'));
    }

    #[test]
    fn test_line_without_color() {
        let reporter = ProgressReporter::new(false, false);
        assert_eq!(reporter.line(Mark::Pass, "login (12 ms)"), "PASS login (12 ms)");
    }

    #[test]
    fn test_step_messages() {
        let passed = record(json!({"step": "login", "status": "passed", "duration_ms": 1200}));
        assert_eq!(passed.step, Step::Login);
        assert_eq!(ProgressReporter::step_message(&passed), "login (1200 ms)");

        let failed = record(json!({
            "step": "verify_order_detail",
            "status": "failed",
            "duration_ms": 30,
            "error": "Timed out"
        }));
        assert_eq!(ProgressReporter::step_message(&failed), "verify_order_detail (30 ms): Timed out");

        let skipped = record(json!({"step": "verify_line_items", "status": "skipped", "duration_ms": 0}));
        assert_eq!(ProgressReporter::step_message(&skipped), "verify_line_items skipped");
    }
}
