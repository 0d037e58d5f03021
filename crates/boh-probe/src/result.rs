//! Result and error types for boh-probe.
//!
//! Errors follow a four-way taxonomy: a single strategy miss is recoverable
//! locally, an exhausted poll escalates to its caller, and assertion or
//! navigation failures end the scenario.

use thiserror::Error;

/// Result type for boh-probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// How far an error is allowed to travel before it ends a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Absorbed by the caller, which tries the next strategy or fallback
    Recoverable,
    /// Bounded wait exhausted; the caller decides fatal vs. degrade
    Escalating,
    /// Aborts the scenario
    Fatal,
}

/// Errors that can occur while driving a flow
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No strategy of a cascade produced a visible element
    #[error("Element not found: {target} ({strategies} strategies tried)")]
    ElementNotFound {
        /// Logical name of the target (e.g. "account field")
        target: String,
        /// Number of strategies evaluated
        strategies: usize,
    },

    /// A bounded poll ran out of attempts or time
    #[error("Timed out waiting for {waited_for} after {attempts} attempts ({elapsed_ms}ms)")]
    WaitTimeout {
        /// Description of the awaited condition
        waited_for: String,
        /// Number of evaluations performed
        attempts: u32,
        /// Elapsed time in milliseconds
        elapsed_ms: u64,
    },

    /// Expected value absent from the captured page text
    #[error("Assertion failed for {field}: expected {expected:?}, page text: {actual:?}")]
    AssertionFailed {
        /// Field under verification
        field: String,
        /// Expected value
        expected: String,
        /// Excerpt of the text that was searched
        actual: String,
    },

    /// Required URL never reached
    #[error("Navigation to {url} failed: {message}")]
    NavigationFailed {
        /// URL involved
        url: String,
        /// Error message
        message: String,
    },

    /// The automation layer rejected a call (invalid selector, stale handle, ...)
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an element-not-found error
    #[must_use]
    pub fn not_found(target: impl Into<String>, strategies: usize) -> Self {
        Self::ElementNotFound {
            target: target.into(),
            strategies,
        }
    }

    /// Create a navigation error
    #[must_use]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NavigationFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::ElementNotFound { .. } | Self::Driver { .. } => Severity::Recoverable,
            Self::WaitTimeout { .. } => Severity::Escalating,
            Self::AssertionFailed { .. }
            | Self::NavigationFailed { .. }
            | Self::BrowserLaunch { .. }
            | Self::Config { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_) => Severity::Fatal,
        }
    }
}
