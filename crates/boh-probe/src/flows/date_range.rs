//! Date-range query on the order list.
//!
//! LocatePicker → SelectStart → SelectEnd → ClickQuery → AwaitResults.
//! Each bound is picked from the calendar overlay when it opens and typed
//! as `YYYY-MM-DD` otherwise.

use super::navigation::{ensure_on_order_page, navigate_to_order_page};
use super::scroll_nudge;
use crate::case::DateRange;
use crate::config::ProbeConfig;
use crate::driver::{ClickOptions, LoadState, PageDriver};
use crate::resolver::{first_present, resolve, CascadeOptions};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Selector, Target};
use crate::wait::{pause_for, tolerate_load_state, wait_for_url, PollPolicy, UrlPattern};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempts at opening the calendar per bound
pub const PICKER_ATTEMPTS: u32 = 3;

/// Generic calendar day cells
const DAY_CELLS: &str =
    "[class*=\"day\"], [class*=\"date\"], [role=\"gridcell\"], td, [class*=\"calendar-day\"]";

/// Containers a bare day number may sit in
const DAY_CONTAINERS: &str = "[class*=\"day\"], [class*=\"date\"]";

/// How one bound of the range was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateEntry {
    /// Picked from the calendar overlay
    Picker,
    /// Typed into the input
    Typed,
    /// No input for this bound was found
    Skipped,
    /// Typing was rejected as well
    Failed,
}

/// How the query was triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTrigger {
    /// A query button was clicked
    Button {
        /// Strategy that found it
        selector: String,
    },
    /// Enter was pressed
    EnterKey,
}

/// What the date-range step did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRangeOutcome {
    /// Start bound
    pub start: DateEntry,
    /// End bound
    pub end: DateEntry,
    /// Query trigger
    pub trigger: QueryTrigger,
    /// URL once results settled
    pub url_after_query: String,
    /// Whether the step had to navigate back to the order list
    pub renavigated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeBound {
    Start,
    End,
}

impl RangeBound {
    fn input(self) -> Target {
        let (name, en, short, zh) = match self {
            Self::Start => ("start date input", "Start Time", "Start", "开始"),
            Self::End => ("end date input", "End Time", "End", "结束"),
        };
        Target::from_css(
            name,
            [
                format!("input[aria-label*=\"{en}\"]"),
                format!("input[aria-label*=\"{short}\"]"),
                format!("input[placeholder*=\"{short}\"]"),
                format!("input[placeholder*=\"{zh}\"]"),
            ],
        )
    }
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::End => "end",
        })
    }
}

/// Calendar overlay containers
#[must_use]
pub fn picker_overlay() -> Target {
    Target::from_css(
        "date picker",
        [
            "[class*=\"calendar\"]",
            "[class*=\"date-picker\"]",
            "[class*=\"picker\"]",
            "[class*=\"DatePicker\"]",
            "[role=\"dialog\"]",
            "[class*=\"ant-picker-dropdown\"]",
            "[class*=\"rc-calendar\"]",
            ".ant-picker-dropdown",
            ".rc-calendar-picker",
        ],
    )
}

/// Day cells labelled with `date`
#[must_use]
pub fn day_cell(date: NaiveDate) -> Target {
    let iso = date.format("%Y-%m-%d").to_string();
    let (y, m, d) = (date.year(), date.month(), date.day());
    Target::from_css(
        format!("day cell {iso}"),
        [
            format!("[aria-label*=\"{iso}\"]"),
            format!("[data-date=\"{iso}\"]"),
            format!("[data-value=\"{iso}\"]"),
            format!("[title*=\"{iso}\"]"),
            format!("[aria-label*=\"{y}年{m}月{d}日\"]"),
            format!("[aria-label*=\"{y}-{m}-{d}\"]"),
        ],
    )
}

/// Query button
#[must_use]
pub fn query_button() -> Target {
    Target::new("query button")
        .or(Selector::css_with_text("button", "查询"))
        .or(Selector::css_with_text("button", "Search"))
        .or_css("button[type=\"submit\"]")
        .or(Selector::css_with_text("button.btn-primary", "查询"))
        .or_css("button.ant-btn-primary")
        .or_css("[class*=\"query-button\"]")
        .or_css("[class*=\"search-button\"]")
        .or_css("button:has([class*=\"search\"])")
        .or_css("button:has([class*=\"query\"])")
}

async fn has_marked_descendant<P: PageDriver>(page: &P, cell: &P::Element, class: &str) -> bool {
    let own = page.attribute(cell, "class").await.ok().flatten().unwrap_or_default();
    if own.contains(class) {
        return true;
    }
    let inner = Selector::css(format!("[class*=\"{class}\"]"));
    match page.query_within(cell, &inner).await {
        Ok(found) => {
            for el in found {
                if page.is_visible(&el).await.unwrap_or(false) {
                    return true;
                }
            }
            false
        }
        Err(_) => false,
    }
}

async fn click_cell<P: PageDriver>(page: &P, cell: &P::Element, config: &ProbeConfig) -> bool {
    match page.click(cell, ClickOptions::default()).await {
        Ok(()) => {
            pause_for(config.timings.settle).await;
            true
        }
        Err(e) => {
            debug!(error = %e, "day cell click rejected");
            false
        }
    }
}

/// Pick `date` from an open calendar overlay.
///
/// Returns `false` when no overlay shows up or no matching day cell can be
/// clicked.
pub async fn select_from_picker<P: PageDriver>(page: &P, config: &ProbeConfig, date: NaiveDate) -> bool {
    let overlay = picker_overlay();
    let mut opened = resolve(page, &overlay, &CascadeOptions::with_timeout(config.timings.strategy_timeout)).await;
    if opened.is_none() {
        pause_for(Duration::from_secs(1)).await;
        opened = resolve(page, &overlay, &CascadeOptions::with_timeout(Duration::from_secs(1))).await;
    }
    if opened.is_none() {
        debug!(%date, "calendar overlay did not open");
        return false;
    }
    pause_for(config.timings.settle).await;

    let iso = date.format("%Y-%m-%d").to_string();
    if let Some(cell) = resolve(page, &day_cell(date), &CascadeOptions::with_timeout(config.timings.strategy_timeout)).await {
        if click_cell(page, &cell.element, config).await {
            info!(%date, selector = %cell.selector, "day picked");
            return true;
        }
    }

    let day = date.day().to_string();
    let cells = page.query_all(&Selector::css(DAY_CELLS)).await.unwrap_or_default();
    debug!(count = cells.len(), "scanning day cells");
    for cell in &cells {
        let text = page.text_content(cell).await.unwrap_or_default();
        let aria = page.attribute(cell, "aria-label").await.ok().flatten().unwrap_or_default();
        let data_date = page.attribute(cell, "data-date").await.ok().flatten().unwrap_or_default();
        let disabled = has_marked_descendant(page, cell, "disabled").await;
        let labelled = aria.contains(&iso) || data_date == iso;
        let same_day = text.trim() == day && !has_marked_descendant(page, cell, "other").await;
        if (labelled || same_day) && !disabled && click_cell(page, cell, config).await {
            info!(%date, "day picked from cell scan");
            return true;
        }
    }

    let numbers = page.query_all(&Selector::text_exact(&day)).await.unwrap_or_default();
    for number in &numbers {
        let Ok(Some(container)) = page.closest(number, DAY_CONTAINERS).await else {
            continue;
        };
        if page.is_visible(&container).await.unwrap_or(false)
            && !has_marked_descendant(page, &container, "disabled").await
            && click_cell(page, &container, config).await
        {
            info!(%date, "day picked by its number");
            return true;
        }
    }
    false
}

async fn set_bound<P: PageDriver>(page: &P, config: &ProbeConfig, bound: RangeBound, date: NaiveDate) -> DateEntry {
    let Some(input) = first_present(page, &bound.input()).await else {
        warn!(%bound, "date input not found, skipping");
        return DateEntry::Skipped;
    };
    let input = input.element;

    for attempt in 1..=PICKER_ATTEMPTS {
        debug!(%bound, attempt, max = PICKER_ATTEMPTS, "opening calendar");
        if let Err(e) = page.scroll_into_view(&input).await {
            debug!(error = %e, "scroll into view failed");
        }
        pause_for(config.timings.settle).await;
        match page.click(&input, ClickOptions::forced()).await {
            Ok(()) => {
                pause_for(config.timings.settle).await;
                if select_from_picker(page, config, date).await {
                    info!(%bound, %date, "date picked");
                    return DateEntry::Picker;
                }
            }
            Err(e) => debug!(error = %e, "date input click failed"),
        }
        if attempt < PICKER_ATTEMPTS {
            pause_for(Duration::from_secs(1)).await;
        }
    }

    let typed = date.format("%Y-%m-%d").to_string();
    let result = async {
        if let Err(e) = page.click(&input, ClickOptions::default()).await {
            debug!(error = %e, "date input click failed before typing");
        }
        page.fill(&input, "").await?;
        page.fill(&input, &typed).await
    }
    .await;
    match result {
        Ok(()) => {
            info!(%bound, date = %typed, "date typed");
            DateEntry::Typed
        }
        Err(e) => {
            warn!(%bound, error = %e, "typing the date failed, continuing");
            DateEntry::Failed
        }
    }
}

/// Click `button` while URL and network-idle waits run alongside.
///
/// The side waits only log; the click's own result is returned as soon as
/// it is known.
async fn click_with_advisory<P: PageDriver>(page: &P, config: &ProbeConfig, button: &P::Element) -> ProbeResult<()> {
    let timeout = config.timings.advisory_timeout;
    let pattern = UrlPattern::Glob(format!("**/{}**", config.page_marker()));
    let url_policy = PollPolicy::elapsed(timeout, Duration::from_millis(250));

    let url_wait = async {
        match wait_for_url(page, &pattern, &url_policy).await {
            Ok(outcome) if outcome.is_satisfied() => debug!(%pattern, "advisory url matched"),
            _ => debug!(%pattern, "advisory url not observed"),
        }
    };
    let idle_wait = async {
        if page.wait_for_load_state(LoadState::NetworkIdle, timeout).await.is_ok() {
            debug!("advisory network idle reached");
        }
    };
    let advisory = async {
        tokio::join!(url_wait, idle_wait);
    };
    let click = page.click(button, ClickOptions::forced());
    tokio::pin!(advisory);
    tokio::pin!(click);

    let mut advisory_done = false;
    loop {
        tokio::select! {
            result = &mut click => return result,
            () = &mut advisory, if !advisory_done => advisory_done = true,
        }
    }
}

async fn press_enter<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<QueryTrigger> {
    match page.press_key("Enter").await {
        Ok(()) => {
            pause_for(config.timings.result_settle).await;
            info!("query triggered with Enter");
            Ok(QueryTrigger::EnterKey)
        }
        Err(e) => {
            warn!(error = %e, "Enter rejected");
            Err(ProbeError::not_found("query button", query_button().len()))
        }
    }
}

async fn trigger_query<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<QueryTrigger> {
    let target = query_button();
    let cascade = CascadeOptions::with_timeout(config.timings.query_button_timeout);
    let mut button = resolve(page, &target, &cascade).await;
    if button.is_none() {
        scroll_nudge(page, config).await;
        button = resolve(page, &target, &cascade).await;
    }
    let Some(button) = button else {
        warn!("query button not found, pressing Enter");
        return press_enter(page, config).await;
    };

    if let Err(e) = page.scroll_into_view(&button.element).await {
        debug!(error = %e, "scroll into view failed");
    }
    pause_for(config.timings.settle).await;
    match click_with_advisory(page, config, &button.element).await {
        Ok(()) => {
            info!(selector = %button.selector, "query button clicked");
            Ok(QueryTrigger::Button {
                selector: button.selector.to_string(),
            })
        }
        Err(e) => {
            warn!(error = %e, "query click failed, pressing Enter");
            press_enter(page, config).await
        }
    }
}

/// Set the range and run the query.
pub async fn select_date_range_and_query<P: PageDriver>(
    page: &P,
    config: &ProbeConfig,
    range: &DateRange,
) -> ProbeResult<DateRangeOutcome> {
    let timings = &config.timings;
    tolerate_load_state(page, LoadState::DomContentLoaded, timings.load_state_timeout).await;
    let mut renavigated = ensure_on_order_page(page, config).await?;
    tolerate_load_state(page, LoadState::DomContentLoaded, timings.load_state_timeout).await;
    pause_for(timings.settle).await;

    let start = set_bound(page, config, RangeBound::Start, range.start).await;
    let end = set_bound(page, config, RangeBound::End, range.end).await;

    renavigated |= ensure_on_order_page(page, config).await?;
    pause_for(timings.settle).await;
    let trigger = trigger_query(page, config).await?;

    tolerate_load_state(page, LoadState::DomContentLoaded, timings.load_state_timeout).await;
    pause_for(timings.result_settle).await;
    let mut url_after_query = page.url().await.unwrap_or_default();
    info!(url = %url_after_query, "query finished");
    if !url_after_query.contains(config.page_marker()) {
        warn!(url = %url_after_query, "query left the order page, navigating back");
        url_after_query = navigate_to_order_page(page, config).await?;
        renavigated = true;
    }

    Ok(DateRangeOutcome {
        start,
        end,
        trigger,
        url_after_query,
        renavigated,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{Effect, MockElement, Screen, ScriptedPage};

    const ORDERS: &str = "https://saas-boh-qa.example/store-supply/demand-daily";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn orders(screen: Screen) -> ScriptedPage {
        ScriptedPage::new(ORDERS).with_screen(screen)
    }

    mod target_tests {
        use super::*;

        #[test]
        fn test_day_cell_forms() {
            let target = day_cell(date(2025, 12, 8));
            let rendered: Vec<String> = target.strategies().iter().map(ToString::to_string).collect();
            assert_eq!(rendered[0], "[aria-label*=\"2025-12-08\"]");
            assert_eq!(rendered[4], "[aria-label*=\"2025年12月8日\"]");
            assert_eq!(rendered[5], "[aria-label*=\"2025-12-8\"]");
        }

        #[test]
        fn test_bound_inputs() {
            let start = RangeBound::Start.input();
            assert_eq!(start.strategies()[3], Selector::css("input[placeholder*=\"开始\"]"));
            let end = RangeBound::End.input();
            assert_eq!(end.strategies()[0], Selector::css("input[aria-label*=\"End Time\"]"));
        }
    }

    mod picker_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_picks_labelled_cell() {
            let page = orders(
                Screen::new(ORDERS)
                    .with_element(
                        MockElement::new("start")
                            .tag("input[placeholder*=\"开始\"]")
                            .on_click(Effect::reveal(["calendar", "d1"])),
                    )
                    .with_element(MockElement::new("calendar").tag("[class*=\"calendar\"]").hidden())
                    .with_element(
                        MockElement::new("d1")
                            .tag("[title*=\"2025-12-01\"]")
                            .text("1")
                            .inside("calendar")
                            .hidden(),
                    ),
            );
            let entry = set_bound(&page, &ProbeConfig::default(), RangeBound::Start, date(2025, 12, 1)).await;
            assert_eq!(entry, DateEntry::Picker);
            assert_eq!(page.clicks(), vec!["start".to_string(), "d1".to_string()]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scan_skips_disabled_cells() {
            let page = orders(
                Screen::new(ORDERS)
                    .with_element(MockElement::new("calendar").tag(".ant-picker-dropdown"))
                    .with_element(
                        MockElement::new("old")
                            .tag("td")
                            .attr("class", "cell disabled")
                            .text("31")
                            .inside("calendar"),
                    )
                    .with_element(MockElement::new("ok").tag("td").text("31").inside("calendar")),
            );
            assert!(select_from_picker(&page, &ProbeConfig::default(), date(2025, 12, 31)).await);
            assert_eq!(page.clicks(), vec!["ok".to_string()]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_overlay_falls_back_to_typing() {
            let page = orders(Screen::new(ORDERS).with_element(MockElement::new("end").tag("input[placeholder*=\"结束\"]")));
            let entry = set_bound(&page, &ProbeConfig::default(), RangeBound::End, date(2025, 12, 31)).await;
            assert_eq!(entry, DateEntry::Typed);
            assert_eq!(page.value_of("end").as_deref(), Some("2025-12-31"));
            assert_eq!(page.clicks().len(), PICKER_ATTEMPTS as usize + 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_input_is_skipped_and_readonly_fails() {
            let page = orders(Screen::new(ORDERS));
            let entry = set_bound(&page, &ProbeConfig::default(), RangeBound::Start, date(2025, 12, 1)).await;
            assert_eq!(entry, DateEntry::Skipped);

            let page = orders(
                Screen::new(ORDERS)
                    .with_element(MockElement::new("start").tag("input[aria-label*=\"Start\"]").attr("readonly", "")),
            );
            let entry = set_bound(&page, &ProbeConfig::default(), RangeBound::Start, date(2025, 12, 1)).await;
            assert_eq!(entry, DateEntry::Failed);
        }
    }

    mod query_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_button_click_with_stalled_advisory() {
            let page = orders(
                Screen::new(ORDERS).with_element(MockElement::new("query").tag("button").text("查询")),
            )
            .stalled(LoadState::NetworkIdle);
            let start = tokio::time::Instant::now();
            let trigger = trigger_query(&page, &ProbeConfig::default()).await.unwrap();
            assert_eq!(
                trigger,
                QueryTrigger::Button {
                    selector: "button:has-text(\"查询\")".into()
                }
            );
            // the click does not wait for the advisory bound
            assert!(start.elapsed() < Duration::from_secs(20));
        }

        #[tokio::test(start_paused = true)]
        async fn test_enter_when_no_button() {
            let page = orders(Screen::new(ORDERS));
            let trigger = trigger_query(&page, &ProbeConfig::default()).await.unwrap();
            assert_eq!(trigger, QueryTrigger::EnterKey);
            assert_eq!(page.keys(), vec!["Enter".to_string()]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_enter_rejected_is_fatal() {
            let page = orders(Screen::new(ORDERS)).failing_key("Enter");
            let err = trigger_query(&page, &ProbeConfig::default()).await.unwrap_err();
            assert!(matches!(err, ProbeError::ElementNotFound { ref target, .. } if target == "query button"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_failed_click_falls_back_to_enter() {
            let page = orders(
                Screen::new(ORDERS).with_element(
                    MockElement::new("query")
                        .tag("button.ant-btn-primary")
                        .on_click(Effect::Fail("detached".into())),
                ),
            );
            let trigger = trigger_query(&page, &ProbeConfig::default()).await.unwrap();
            assert_eq!(trigger, QueryTrigger::EnterKey);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_step_renavigates_after_query() {
        let elsewhere = "https://saas-boh-qa.example/other";
        let page = orders(
            Screen::new(ORDERS)
                .with_element(MockElement::new("start").tag("input[placeholder*=\"开始\"]"))
                .with_element(MockElement::new("end").tag("input[placeholder*=\"结束\"]"))
                .on_enter(Effect::navigate(elsewhere)),
        );
        let outcome = select_date_range_and_query(&page, &ProbeConfig::default(), &DateRange::default())
            .await
            .unwrap();
        assert_eq!(outcome.start, DateEntry::Typed);
        assert_eq!(outcome.end, DateEntry::Typed);
        assert_eq!(outcome.trigger, QueryTrigger::EnterKey);
        assert!(outcome.renavigated);
        assert_eq!(outcome.url_after_query, ORDERS);
        assert_eq!(page.value_of("start").as_deref(), Some("2025-12-01"));
    }
}
