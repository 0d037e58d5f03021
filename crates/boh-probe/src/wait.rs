//! Bounded polling.
//!
//! Every wait in the flows goes through [`poll`]: a condition is evaluated
//! on live page state at a fixed interval until it yields a value or the
//! bound runs out. Bounds are either an attempt count (data-load waits) or
//! an elapsed-time budget (navigation waits). The loop never sleeps past
//! its time budget and never evaluates more than its attempt budget.

use crate::driver::{LoadState, PageDriver};
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Shortest pause between two evaluations
const MIN_PAUSE: Duration = Duration::from_millis(1);

// =============================================================================
// POLICY
// =============================================================================

/// Upper bound of a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollBound {
    /// Evaluate at most this many times (0 is treated as 1)
    Attempts(u32),
    /// Stop evaluating once this much time has elapsed
    #[serde(with = "millis")]
    Elapsed(Duration),
}

/// Interval and bound for one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Pause between evaluations
    #[serde(with = "millis")]
    pub interval: Duration,
    /// When to give up, written as a one-key map (`bound: {attempts: 15}`)
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub bound: PollBound,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            bound: PollBound::Elapsed(Duration::from_secs(30)),
        }
    }
}

impl PollPolicy {
    /// Attempt-bounded policy
    #[must_use]
    pub const fn attempts(max: u32, interval: Duration) -> Self {
        Self {
            interval,
            bound: PollBound::Attempts(max),
        }
    }

    /// Time-bounded policy
    #[must_use]
    pub const fn elapsed(timeout: Duration, interval: Duration) -> Self {
        Self {
            interval,
            bound: PollBound::Elapsed(timeout),
        }
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of a poll that did not error
#[derive(Debug, Clone)]
pub struct WaitOutcome<T> {
    /// Value produced by the satisfied condition
    pub value: Option<T>,
    /// Number of evaluations performed
    pub attempts: u32,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

impl<T> WaitOutcome<T> {
    /// Whether the condition was met within the bound
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        self.value.is_some()
    }

    /// Convert an exhausted poll into [`ProbeError::WaitTimeout`]
    pub fn into_result(self) -> ProbeResult<T> {
        match self.value {
            Some(value) => Ok(value),
            None => Err(ProbeError::WaitTimeout {
                waited_for: self.waited_for,
                attempts: self.attempts,
                elapsed_ms: self.elapsed.as_millis() as u64,
            }),
        }
    }
}

// =============================================================================
// POLL LOOP
// =============================================================================

/// Evaluate `check` until it yields `Some`, or the policy bound is exhausted.
///
/// `check` receives the 1-based attempt number. An `Err` from `check` stops
/// the poll and is returned as is; conditions that should ride over read
/// errors map them to `Ok(None)` themselves.
pub async fn poll<T, F, Fut>(
    waited_for: impl Into<String>,
    policy: &PollPolicy,
    mut check: F,
) -> ProbeResult<WaitOutcome<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ProbeResult<Option<T>>>,
{
    let waited_for = waited_for.into();
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = check(attempts).await? {
            return Ok(WaitOutcome {
                value: Some(value),
                attempts,
                elapsed: start.elapsed(),
                waited_for,
            });
        }

        let pause = match policy.bound {
            PollBound::Attempts(max) => {
                if attempts >= max.max(1) {
                    break;
                }
                policy.interval
            }
            PollBound::Elapsed(timeout) => {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    break;
                }
                policy.interval.max(MIN_PAUSE).min(timeout - elapsed)
            }
        };
        tokio::time::sleep(pause).await;
    }

    debug!(waited_for = %waited_for, attempts, "poll exhausted");
    Ok(WaitOutcome {
        value: None,
        attempts,
        elapsed: start.elapsed(),
        waited_for,
    })
}

/// Boolean form of [`poll`]
pub async fn poll_until<F, Fut>(
    waited_for: impl Into<String>,
    policy: &PollPolicy,
    mut check: F,
) -> ProbeResult<WaitOutcome<()>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ProbeResult<bool>>,
{
    poll(waited_for, policy, move |attempt| {
        let fut = check(attempt);
        async move { Ok(fut.await?.then_some(())) }
    })
    .await
}

// =============================================================================
// URL PATTERNS
// =============================================================================

/// URL matcher for navigation waits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Glob pattern (e.g. `**/demand-daily**`)
    Glob(String),
}

impl UrlPattern {
    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern.as_str()),
            Self::Contains(pattern) => url.contains(pattern.as_str()),
            Self::Glob(pattern) => glob_matches(pattern, url),
        }
    }
}

fn glob_matches(pattern: &str, url: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match url[pos..].find(part) {
            Some(found) => {
                if i == 0 && found != 0 {
                    return false;
                }
                pos += found + part.len();
            }
            None => return false,
        }
    }
    pattern.ends_with('*') || pos == url.len()
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "url == {p}"),
            Self::Prefix(p) => write!(f, "url starts with {p}"),
            Self::Contains(p) => write!(f, "url contains {p}"),
            Self::Glob(p) => write!(f, "url ~ {p}"),
        }
    }
}

// =============================================================================
// PAGE HELPERS
// =============================================================================

/// Poll the page URL until it matches `pattern`. URL read errors count as
/// a miss.
pub async fn wait_for_url<P: PageDriver>(
    page: &P,
    pattern: &UrlPattern,
    policy: &PollPolicy,
) -> ProbeResult<WaitOutcome<String>> {
    poll(pattern.to_string(), policy, move |_| async move {
        Ok(page.url().await.ok().filter(|url| pattern.matches(url)))
    })
    .await
}

/// Wait for a load state, logging and swallowing a timeout.
///
/// Returns whether the state was reached.
pub async fn tolerate_load_state<P: PageDriver>(
    page: &P,
    state: LoadState,
    timeout: Duration,
) -> bool {
    match page.wait_for_load_state(state, timeout).await {
        Ok(()) => true,
        Err(e) => {
            warn!(%state, error = %e, "load state not reached, continuing");
            false
        }
    }
}

/// Fixed pause (discouraged - prefer a condition)
pub async fn pause_for(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// =============================================================================
// TESTS
// =============================================================================
