//! Order detail page: opening it and verifying its header fields.
//!
//! The detail page renders every field as `label：-` until its data has
//! loaded. Verification polls the body text until all fields are populated,
//! reloads once when placeholders remain, polls again, and only then asserts.

use super::{body_or_empty, scroll_nudge, single};
use crate::case::OrderCase;
use crate::config::ProbeConfig;
use crate::driver::{ClickOptions, LoadState, PageDriver};
use crate::resolver::{resolve, CascadeOptions};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Selector, Target};
use crate::verify::{assert_store_code, excerpt, placeholder, VerificationRecord, LOG_EXCERPT_CHARS};
use crate::wait::{pause_for, poll_until, tolerate_load_state, wait_for_url, PollPolicy, UrlPattern, WaitOutcome};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempts of the order-number pre-wait
pub const PRE_WAIT_ATTEMPTS: u32 = 10;

/// Every n-th poll attempt scrolls the page
pub const NUDGE_EVERY: u32 = 5;

/// How the detail page was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailOpened {
    /// Clicked the exact order-number text
    ExactText,
    /// Clicked text containing the order number
    PartialText,
    /// Clicked a link to the order
    Link,
    /// Nothing was clicked
    NotOpened,
}

/// What detail verification did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailOutcome {
    /// Whether a reload was needed
    pub reloaded: bool,
    /// Polls of the first wait
    pub first_wait_attempts: u32,
    /// Polls after the reload
    pub reload_wait_attempts: Option<u32>,
    /// Store code read from the page
    pub store_code: String,
}

/// One labelled header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailField<'a> {
    /// Label as rendered (without the colon)
    pub label: &'static str,
    /// Expected value
    pub expected: &'a str,
}

impl DetailField<'_> {
    /// Expected value present and placeholder gone
    #[must_use]
    pub fn is_populated(&self, text: &str) -> bool {
        text.contains(self.expected) && !self.shows_placeholder(text)
    }

    /// Placeholder still rendered
    #[must_use]
    pub fn shows_placeholder(&self, text: &str) -> bool {
        text.contains(&placeholder(self.label))
    }
}

/// Header fields of the detail page for `case`
#[must_use]
pub fn detail_fields(case: &OrderCase) -> [DetailField<'_>; 5] {
    [
        DetailField {
            label: "订货单号",
            expected: &case.order_number,
        },
        DetailField {
            label: "单据状态",
            expected: &case.status,
        },
        DetailField {
            label: "来源",
            expected: &case.source,
        },
        DetailField {
            label: "订货日期",
            expected: &case.order_date,
        },
        DetailField {
            label: "订货门店",
            expected: &case.store,
        },
    ]
}

/// Links that lead to the order
#[must_use]
pub fn order_link(order_number: &str) -> Target {
    Target::new("order link")
        .or(Selector::css_with_text("a", order_number))
        .or(Selector::css(format!("[href*=\"{order_number}\"]")))
}

async fn await_detail_url<P: PageDriver>(page: &P) {
    let policy = PollPolicy::elapsed(Duration::from_secs(15), Duration::from_millis(250));
    for pattern in [
        UrlPattern::Glob("**/detail**".into()),
        UrlPattern::Glob("**/order/**".into()),
    ] {
        if let Ok(outcome) = wait_for_url(page, &pattern, &policy).await {
            if let Some(url) = outcome.value {
                debug!(%pattern, url = %url, "detail url reached");
                return;
            }
        }
    }
    debug!("no detail url observed");
}

/// Click through from the list to the order's detail page.
///
/// Not finding anything to click is only a warning; detail verification
/// reports whether the page actually loaded.
pub async fn open_order_detail<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<DetailOpened> {
    let order_number = config.case.order_number.as_str();
    tolerate_load_state(page, LoadState::DomContentLoaded, config.timings.load_state_timeout).await;
    pause_for(config.timings.settle).await;

    let wait = CascadeOptions::with_timeout(Duration::from_secs(10));
    let mut opened = DetailOpened::NotOpened;
    for (kind, selector) in [
        (DetailOpened::ExactText, Selector::text_exact(order_number)),
        (DetailOpened::PartialText, Selector::text_contains(order_number)),
    ] {
        let Some(hit) = resolve(page, &single("order number", selector), &wait).await else {
            continue;
        };
        match page.click(&hit.element, ClickOptions::default()).await {
            Ok(()) => {
                await_detail_url(page).await;
                opened = kind;
                break;
            }
            Err(e) => debug!(error = %e, "order number click failed"),
        }
    }

    if opened == DetailOpened::NotOpened {
        'links: for selector in order_link(order_number).strategies() {
            for link in page.query_all(selector).await.unwrap_or_default() {
                if page.is_visible(&link).await.unwrap_or(false)
                    && page.click(&link, ClickOptions::default()).await.is_ok()
                {
                    await_detail_url(page).await;
                    opened = DetailOpened::Link;
                    break 'links;
                }
            }
        }
    }

    tolerate_load_state(page, LoadState::DomContentLoaded, config.timings.load_state_timeout).await;
    pause_for(config.timings.settle).await;
    let url = page.url().await.unwrap_or_default();
    if opened == DetailOpened::NotOpened {
        warn!(url = %url, "could not click through to the order, continuing");
    } else {
        info!(url = %url, ?opened, "detail page opened");
    }
    Ok(opened)
}

async fn await_populated<P: PageDriver>(
    page: &P,
    config: &ProbeConfig,
    fields: &[DetailField<'_>],
    policy: &PollPolicy,
) -> ProbeResult<WaitOutcome<()>> {
    poll_until("detail fields populated", policy, move |attempt| async move {
        let text = body_or_empty(page).await;
        if fields.iter().all(|f| f.is_populated(&text)) {
            return Ok(true);
        }
        if attempt % NUDGE_EVERY == 0 {
            debug!(attempt, max = ?policy.bound, "still waiting for detail data");
            scroll_nudge(page, config).await;
        }
        Ok(false)
    })
    .await
}

fn placeholders_left<'a>(fields: &[DetailField<'a>], text: &str) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|f| f.shows_placeholder(text))
        .map(|f| f.label)
        .collect()
}

/// Wait for the detail header to load, then check every field.
///
/// Running it again on an unchanged page converges to the same result
/// without another reload.
pub async fn verify_order_detail<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<DetailOutcome> {
    let case = &config.case;
    let timings = &config.timings;
    let fields = detail_fields(case);
    tolerate_load_state(page, LoadState::DomContentLoaded, timings.load_state_timeout).await;

    let order_field = fields[0];
    let pre = PollPolicy::attempts(PRE_WAIT_ATTEMPTS, Duration::from_secs(1));
    let pre_wait = poll_until("order number on detail page", &pre, move |_| async move {
        Ok(order_field.is_populated(&body_or_empty(page).await))
    })
    .await?;
    if !pre_wait.is_satisfied() {
        debug!("order number not yet shown, nudging the page");
        scroll_nudge(page, config).await;
    }

    let first = await_populated(page, config, &fields, &timings.detail_wait).await?;
    let mut loaded = first.is_satisfied();
    let mut text = body_or_empty(page).await;
    debug!(text = %excerpt(&text, LOG_EXCERPT_CHARS), "detail page text");

    let mut reload_wait_attempts = None;
    if !loaded && !placeholders_left(&fields, &text).is_empty() {
        warn!(fields = ?placeholders_left(&fields, &text), "detail still shows placeholders, reloading once");
        if let Err(e) = page.reload(LoadState::DomContentLoaded).await {
            warn!(error = %e, "reload failed");
        }
        pause_for(timings.result_settle).await;
        let second = await_populated(page, config, &fields, &timings.detail_reload_wait).await?;
        loaded = second.is_satisfied();
        reload_wait_attempts = Some(second.attempts);
        text = body_or_empty(page).await;

        let left = placeholders_left(&fields, &text);
        if !left.is_empty() {
            return Err(ProbeError::WaitTimeout {
                waited_for: format!("detail fields after reload: {}", left.join(", ")),
                attempts: second.attempts,
                elapsed_ms: second.elapsed.as_millis() as u64,
            });
        }
    }
    debug!(loaded, "detail wait finished");

    for field in &fields {
        VerificationRecord::new(field.label, field.expected, &text).check()?;
        if field.shows_placeholder(&text) {
            return Err(ProbeError::AssertionFailed {
                field: field.label.to_string(),
                expected: field.expected.to_string(),
                actual: placeholder(field.label),
            });
        }
    }
    assert_store_code(&case.store_code, &text)?;
    info!(order = %case.order_number, "detail header verified");

    Ok(DetailOutcome {
        reloaded: reload_wait_attempts.is_some(),
        first_wait_attempts: first.attempts,
        reload_wait_attempts,
        store_code: case.store_code.clone(),
    })
}
