//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// The scenario ran and a step failed
    #[error("Scenario failed at {step}: {message}")]
    ScenarioFailed {
        /// Failing step
        step: String,
        /// Error of that step
        message: String,
    },

    /// A compiled-out capability was requested
    #[error("{what} not enabled. Rebuild with --features {feature}")]
    FeatureDisabled {
        /// Capability
        what: &'static str,
        /// Cargo feature providing it
        feature: &'static str,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Library error
    #[error("{0}")]
    Probe(#[from] boh_probe::ProbeError),

    /// YAML output error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The browser backend is compiled out
    #[must_use]
    pub const fn browser_disabled() -> Self {
        Self::FeatureDisabled {
            what: "Browser support",
            feature: "browser",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boh_probe::ProbeError;

    #[test]
    fn test_browser_disabled_message() {
        assert_eq!(
            CliError::browser_disabled().to_string(),
            "Browser support not enabled. Rebuild with --features browser"
        );
    }

    #[test]
    fn test_probe_error_is_passed_through() {
        let err: CliError = ProbeError::NavigationFailed {
            url: "https://boh.example/home".into(),
            message: "still on the login page".into(),
        }
        .into();
        assert!(err.to_string().contains("still on the login page"));
    }

    #[test]
    fn test_scenario_failed_message() {
        let err = CliError::ScenarioFailed {
            step: "login".into(),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Scenario failed at login: boom");
    }
}
