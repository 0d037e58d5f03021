//! Failure artifacts.
//!
//! When a scenario fails, the harness takes a screenshot of the page and
//! hands it to an [`ArtifactSink`]. The default sink writes it to
//! `<output_dir>/<scenario>/screenshot.png`.

use crate::result::ProbeResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the failure screenshot
pub const SCREENSHOT_FILE: &str = "screenshot.png";

/// Destination for failure artifacts
pub trait ArtifactSink: Send + Sync {
    /// Store a failure screenshot (PNG bytes). Returns the paths written.
    fn store_failure(&self, scenario: &str, png: &[u8]) -> ProbeResult<Vec<PathBuf>>;
}

/// Discards every artifact
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifacts;

impl ArtifactSink for NoArtifacts {
    fn store_failure(&self, _scenario: &str, _png: &[u8]) -> ProbeResult<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Writes the failure screenshot below an output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotOnFailure {
    output_dir: PathBuf,
}

impl ScreenshotOnFailure {
    /// Sink rooted at `output_dir`
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Root directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the screenshot of `scenario` goes
    #[must_use]
    pub fn screenshot_path(&self, scenario: &str) -> PathBuf {
        self.output_dir
            .join(sanitize_name(scenario))
            .join(SCREENSHOT_FILE)
    }
}

impl ArtifactSink for ScreenshotOnFailure {
    fn store_failure(&self, scenario: &str, png: &[u8]) -> ProbeResult<Vec<PathBuf>> {
        let path = self.screenshot_path(scenario);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, png)?;
        info!(path = %path.display(), "failure screenshot saved");
        Ok(vec![path])
    }
}

/// Directory-safe form of a scenario name
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '_') {
        "scenario".to_string()
    } else {
        cleaned
    }
}
