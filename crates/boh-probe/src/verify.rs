//! Text assertions over captured page text.

use crate::result::{ProbeError, ProbeResult};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Characters of page text attached to an assertion failure
pub const FAILURE_EXCERPT_CHARS: usize = 500;

/// Characters of page text logged for notices and errors
pub const LOG_EXCERPT_CHARS: usize = 200;

/// Full-width colon used by the detail page labels
pub const LABEL_SEPARATOR: char = '：';

/// Text a detail field shows before its data has loaded (`订货单号：-`)
#[must_use]
pub fn placeholder(label: &str) -> String {
    format!("{label}{LABEL_SEPARATOR}-")
}

/// Leading `max_chars` characters of `text`
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// One field check: expected value against a page-text snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationRecord<'a> {
    /// Field under verification
    pub field: &'a str,
    /// Expected value
    pub expected: &'a str,
    /// Text searched
    pub actual: &'a str,
}

impl<'a> VerificationRecord<'a> {
    /// Create a record
    #[must_use]
    pub const fn new(field: &'a str, expected: &'a str, actual: &'a str) -> Self {
        Self {
            field,
            expected,
            actual,
        }
    }

    /// Whether `expected` occurs in `actual`
    #[must_use]
    pub fn passed(&self) -> bool {
        self.actual.contains(self.expected)
    }

    /// `Ok` when passed, otherwise [`ProbeError::AssertionFailed`] with an excerpt
    pub fn check(&self) -> ProbeResult<()> {
        if self.passed() {
            info!(field = self.field, expected = self.expected, "verified");
            Ok(())
        } else {
            Err(ProbeError::AssertionFailed {
                field: self.field.to_string(),
                expected: self.expected.to_string(),
                actual: excerpt(self.actual, FAILURE_EXCERPT_CHARS),
            })
        }
    }
}

/// Assert `text` contains `expected`
pub fn assert_contains(field: &str, expected: &str, text: &str) -> ProbeResult<()> {
    VerificationRecord::new(field, expected, text).check()
}

fn store_code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"订货门店编号[：:]\s*(\d+)").ok())
        .as_ref()
}

/// Store code shown as `订货门店编号：<digits>`
#[must_use]
pub fn store_code(text: &str) -> Option<&str> {
    store_code_pattern()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Assert the labelled store code equals `expected`
pub fn assert_store_code(expected: &str, text: &str) -> ProbeResult<()> {
    let found = store_code(text);
    debug!(?found, expected, "store code");
    if found == Some(expected) {
        info!(field = "store code", expected, "verified");
        Ok(())
    } else {
        Err(ProbeError::AssertionFailed {
            field: "store code".into(),
            expected: expected.to_string(),
            actual: found.map_or_else(|| excerpt(text, FAILURE_EXCERPT_CHARS), str::to_string),
        })
    }
}
