//! Selector cascade resolution.
//!
//! A cascade walks the strategies of a [`Target`] strictly in order and
//! returns the first element that becomes visible within a short
//! per-strategy timeout. A strategy the driver rejects (invalid selector,
//! stale handle) counts as "did not match" and the walk moves on. There is
//! one pass per call; callers that want broader retrying wrap the call in
//! [`crate::wait::poll`].

use crate::driver::PageDriver;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Selector, Target};
use crate::wait::{poll, PollPolicy};
use std::time::Duration;
use tracing::{debug, info};

/// Default per-strategy visibility timeout (2s)
pub const DEFAULT_STRATEGY_TIMEOUT_MS: u64 = 2000;

/// Default interval between visibility checks within one strategy
pub const DEFAULT_VISIBILITY_POLL_MS: u64 = 100;

/// Timing of one cascade pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOptions {
    /// How long each strategy may take to produce a visible element
    pub per_strategy_timeout: Duration,
    /// Interval between visibility checks
    pub poll_interval: Duration,
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self {
            per_strategy_timeout: Duration::from_millis(DEFAULT_STRATEGY_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_VISIBILITY_POLL_MS),
        }
    }
}

impl CascadeOptions {
    /// Options with a given per-strategy timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            per_strategy_timeout: timeout,
            ..Self::default()
        }
    }
}

/// A cascade hit
#[derive(Debug, Clone)]
pub struct Resolved<E> {
    /// The visible element
    pub element: E,
    /// Position of the winning strategy
    pub strategy_index: usize,
    /// The winning strategy
    pub selector: Selector,
}

/// A row picked up by [`resolve_rows`]
#[derive(Debug, Clone)]
pub struct RowMatch<E> {
    /// Row element
    pub element: E,
    /// Its text content
    pub text: String,
    /// Strategy that produced the row
    pub selector: Selector,
}

async fn first_visible<P: PageDriver>(
    page: &P,
    scope: Option<&P::Element>,
    selector: &Selector,
) -> ProbeResult<Option<P::Element>> {
    let candidates = match scope {
        Some(scope) => page.query_within(scope, selector).await?,
        None => page.query_all(selector).await?,
    };
    for candidate in candidates {
        if page.is_visible(&candidate).await.unwrap_or(false) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Walk `target` below `scope` (or the whole document)
pub async fn resolve_in<P: PageDriver>(
    page: &P,
    scope: Option<&P::Element>,
    target: &Target,
    options: &CascadeOptions,
) -> Option<Resolved<P::Element>> {
    let policy = PollPolicy::elapsed(options.per_strategy_timeout, options.poll_interval);
    for (index, selector) in target.strategies().iter().enumerate() {
        let outcome = poll(selector.to_string(), &policy, move |_| async move {
            first_visible(page, scope, selector).await
        })
        .await;
        match outcome {
            Ok(outcome) => {
                if let Some(element) = outcome.value {
                    info!(element = target.name(), selector = %selector, index, "found");
                    return Some(Resolved {
                        element,
                        strategy_index: index,
                        selector: selector.clone(),
                    });
                }
            }
            Err(e) => debug!(element = target.name(), selector = %selector, error = %e, "strategy rejected"),
        }
    }
    debug!(element = target.name(), strategies = target.len(), "no strategy matched");
    None
}

/// Walk `target` over the whole document
pub async fn resolve<P: PageDriver>(
    page: &P,
    target: &Target,
    options: &CascadeOptions,
) -> Option<Resolved<P::Element>> {
    resolve_in(page, None, target, options).await
}

/// Like [`resolve`], but a miss is [`ProbeError::ElementNotFound`]
pub async fn require<P: PageDriver>(
    page: &P,
    target: &Target,
    options: &CascadeOptions,
) -> ProbeResult<Resolved<P::Element>> {
    resolve(page, target, options)
        .await
        .ok_or_else(|| ProbeError::not_found(target.name(), target.len()))
}

/// First element of the earliest strategy with any match, visible or not.
///
/// Single query per strategy, no waiting.
pub async fn first_present<P: PageDriver>(page: &P, target: &Target) -> Option<Resolved<P::Element>> {
    for (index, selector) in target.strategies().iter().enumerate() {
        match page.query_all(selector).await {
            Ok(found) => {
                if let Some(element) = found.into_iter().next() {
                    debug!(element = target.name(), selector = %selector, "present");
                    return Some(Resolved {
                        element,
                        strategy_index: index,
                        selector: selector.clone(),
                    });
                }
            }
            Err(e) => debug!(element = target.name(), selector = %selector, error = %e, "strategy rejected"),
        }
    }
    None
}

/// First strategy of `target` whose matches contain rows accepted by `keep`.
///
/// Strategies are queried once each, without waiting for visibility. Rows
/// whose text cannot be read are skipped. Every returned row carries the
/// winning strategy.
pub async fn resolve_rows<P, F>(page: &P, target: &Target, keep: F) -> Vec<RowMatch<P::Element>>
where
    P: PageDriver,
    F: Fn(&str) -> bool + Send + Sync,
{
    for selector in target.strategies() {
        let candidates = match page.query_all(selector).await {
            Ok(found) => found,
            Err(e) => {
                debug!(element = target.name(), selector = %selector, error = %e, "strategy rejected");
                continue;
            }
        };
        let mut rows = Vec::new();
        for element in candidates {
            if let Ok(text) = page.text_content(&element).await {
                if keep(&text) {
                    rows.push(RowMatch {
                        element,
                        text,
                        selector: selector.clone(),
                    });
                }
            }
        }
        if !rows.is_empty() {
            info!(element = target.name(), selector = %selector, rows = rows.len(), "rows found");
            return rows;
        }
    }
    Vec::new()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, Screen, ScriptedPage};

    const URL: &str = "https://auth.example/page/login";

    fn page_with(elements: Vec<MockElement>) -> ScriptedPage {
        let screen = elements
            .into_iter()
            .fold(Screen::new(URL), Screen::with_element);
        ScriptedPage::new(URL).with_screen(screen)
    }

    fn password_field() -> Target {
        Target::from_css(
            "password field",
            ["input[name=\"password\"]", "#password", "input[type=\"password\"]"],
        )
    }

    mod cascade_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_first_match_wins_and_later_strategies_untouched() {
            let page = page_with(vec![
                MockElement::new("by-id").tag("#password"),
                MockElement::new("by-type").tag("input[type=\"password\"]"),
            ]);
            let hit = resolve(&page, &password_field(), &CascadeOptions::default())
                .await
                .unwrap();
            assert_eq!(hit.strategy_index, 1);
            assert_eq!(hit.selector, Selector::css("#password"));
            assert!(!page
                .query_log()
                .contains(&"input[type=\"password\"]".to_string()));
        }

        #[tokio::test(start_paused = true)]
        async fn test_hidden_match_falls_through() {
            let page = page_with(vec![
                MockElement::new("hidden").tag("input[name=\"password\"]").hidden(),
                MockElement::new("typed").tag("input[type=\"password\"]"),
            ]);
            let hit = resolve(&page, &password_field(), &CascadeOptions::default())
                .await
                .unwrap();
            assert_eq!(hit.strategy_index, 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_first_visible_among_matches() {
            let page = page_with(vec![
                MockElement::new("a").tag("#password").hidden(),
                MockElement::new("b").tag("#password").text("b"),
            ]);
            let hit = resolve(&page, &password_field(), &CascadeOptions::default())
                .await
                .unwrap();
            assert_eq!(page.text_content(&hit.element).await.unwrap(), "b");
            assert_eq!(hit.strategy_index, 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_invalid_selector_is_a_miss() {
            let page = page_with(vec![MockElement::new("typed").tag("input[type=\"password\"]")])
                .failing_selector("input[name=\"password\"]");
            let hit = resolve(&page, &password_field(), &CascadeOptions::default())
                .await
                .unwrap();
            assert_eq!(hit.strategy_index, 2);
            let log = page.query_log();
            assert_eq!(
                log.iter().filter(|s| *s == "input[name=\"password\"]").count(),
                1,
                "a rejected strategy is not re-polled"
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_require_names_the_target() {
            let page = page_with(vec![]);
            let start = tokio::time::Instant::now();
            let err = require(&page, &password_field(), &CascadeOptions::default())
                .await
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                "Element not found: password field (3 strategies tried)"
            );
            // each strategy spends its whole timeout
            assert_eq!(start.elapsed(), Duration::from_secs(6));
        }

        #[tokio::test(start_paused = true)]
        async fn test_scoped_resolution() {
            let page = page_with(vec![
                MockElement::new("outside").tag("span").text("合阔x"),
                MockElement::new("header").tag("header"),
                MockElement::new("inside").tag("em").text("合阔x").inside("header"),
            ]);
            let header = resolve(&page, &Target::from_css("header", ["header"]), &CascadeOptions::default())
                .await
                .unwrap();
            let tenant = Target::new("tenant").or(Selector::text_contains("合阔x"));
            let hit = resolve_in(&page, Some(&header.element), &tenant, &CascadeOptions::default())
                .await
                .unwrap();
            assert_eq!(page.text_content(&hit.element).await.unwrap(), "合阔x");
            assert_eq!(page.query_within(&header.element, &Selector::css("span")).await.unwrap().len(), 0);
        }
    }

    mod row_tests {
        use super::*;

        #[tokio::test]
        async fn test_first_present_ignores_visibility() {
            let page = page_with(vec![MockElement::new("start").tag("input[placeholder*=\"开始\"]").hidden()]);
            let target = Target::from_css("start date input", ["input[aria-label*=\"Start\"]", "input[placeholder*=\"开始\"]"]);
            let hit = first_present(&page, &target).await.unwrap();
            assert_eq!(hit.strategy_index, 1);
            assert!(first_present(&page, &Target::from_css("none", ["#none"])).await.is_none());
        }

        #[tokio::test]
        async fn test_rows_from_first_productive_strategy() {
            let page = page_with(vec![
                MockElement::new("head").tag("tbody tr").text("商品编号 商品名称"),
                MockElement::new("r1").tag("tbody tr").text("T20251128012 测试20251128012"),
                MockElement::new("r2").tag("table tr").text("T20251128012 测试20251128012"),
            ]);
            let target = Target::from_css("line items", ["[class*=\"item-row\"]", "tbody tr", "table tr"]);
            let rows = resolve_rows(&page, &target, |t| {
                t.contains("T20251128012") && !t.contains("商品编号")
            })
            .await;
            assert_eq!(rows.len(), 1);
            assert!(rows[0].text.starts_with("T20251128012"));
            assert_eq!(rows[0].selector, Selector::css("tbody tr"));
            assert!(!page.query_log().contains(&"table tr".to_string()));
        }

        #[tokio::test]
        async fn test_no_rows() {
            let page = page_with(vec![]).failing_selector("tbody tr");
            let target = Target::from_css("line items", ["tbody tr"]);
            assert!(resolve_rows(&page, &target, |_| true).await.is_empty());
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_earliest_visible_strategy_wins(
                visible in proptest::collection::vec(any::<Option<bool>>(), 1..6)
            ) {
                // None: no element for this strategy; Some(v): one element with visibility v
                let mut elements = Vec::new();
                for (i, v) in visible.iter().enumerate() {
                    if let Some(v) = v {
                        let mut el = MockElement::new(format!("e{i}")).tag(format!("#s{i}"));
                        if !v {
                            el = el.hidden();
                        }
                        elements.push(el);
                    }
                }
                let page = page_with(elements);
                let target = Target::from_css("t", (0..visible.len()).map(|i| format!("#s{i}")));
                let expected = visible.iter().position(|v| *v == Some(true));

                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();
                let hit = rt.block_on(resolve(&page, &target, &CascadeOptions::default()));
                prop_assert_eq!(hit.map(|h| h.strategy_index), expected);
                if let Some(winner) = expected {
                    for later in winner + 1..visible.len() {
                        let later_selector = format!("#s{later}");
                        prop_assert!(!page.query_log().contains(&later_selector));
                    }
                }
            }
        }
    }
}
