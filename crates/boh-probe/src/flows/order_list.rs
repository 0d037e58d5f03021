//! Order row lookup and list-field checks.

use super::navigation::ensure_on_order_page;
use super::{body_or_empty, scroll_nudge, single, ROW_ANCESTORS};
use crate::config::ProbeConfig;
use crate::driver::{LoadState, PageDriver};
use crate::resolver::{resolve, CascadeOptions};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Selector, Target};
use crate::verify::{assert_contains, excerpt, FAILURE_EXCERPT_CHARS};
use crate::wait::{pause_for, tolerate_load_state};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rows inside a data table
const TABLE_ROWS: &str = "tr, [class*=\"row\"], [role=\"row\"]";

/// Row containers used by the page-wide search
const PAGE_ROWS: &str = "tr, [class*=\"row\"]";

/// Which lookup produced the row text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    /// Exact order-number cell, then its row
    ExactText,
    /// Row scan of a data table
    Table,
    /// Page-wide text search, then its row
    PageSearch,
    /// The order number only appears in the body text
    BodyText,
}

/// The order's row in the list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRow {
    /// Lookup used
    pub source: RowSource,
    /// Row text (the body text for [`RowSource::BodyText`])
    pub text: String,
}

/// Data tables of the order list
#[must_use]
pub fn data_table() -> Target {
    Target::new("order table")
        .or(Selector::css_with_text("table", "订货单号"))
        .or(Selector::css_with_text("table", "状态"))
        .or(Selector::css_with_text("[class*=\"table\"]", "订货单号"))
        .or(Selector::css_with_text("[class*=\"table\"]", "状态"))
        .or(Selector::css_with_text("[role=\"table\"]", "订货单号"))
        .or(Selector::css_with_text("[role=\"grid\"]", "订货单号"))
}

async fn row_of<P: PageDriver>(page: &P, cell: &P::Element, rows: &str) -> Option<String> {
    let row = page.closest(cell, rows).await.ok().flatten()?;
    if !page.is_visible(&row).await.unwrap_or(false) {
        return None;
    }
    page.text_content(&row).await.ok()
}

async fn scan_tables<P: PageDriver>(page: &P, order_number: &str) -> Option<String> {
    let cascade = CascadeOptions::with_timeout(Duration::from_secs(3));
    for selector in data_table().strategies() {
        let Some(table) = resolve(page, &single("order table", selector.clone()), &cascade).await else {
            continue;
        };
        let rows = page
            .query_within(&table.element, &Selector::css(TABLE_ROWS))
            .await
            .unwrap_or_default();
        debug!(selector = %selector, rows = rows.len(), "scanning table");
        for row in &rows {
            if let Ok(text) = page.text_content(row).await {
                if text.contains(order_number) {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Find the list row of the configured order.
pub async fn find_order_row<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<OrderRow> {
    let order_number = config.case.order_number.as_str();
    tolerate_load_state(page, LoadState::DomContentLoaded, config.timings.load_state_timeout).await;
    pause_for(config.timings.settle).await;
    ensure_on_order_page(page, config).await?;
    scroll_nudge(page, config).await;

    let exact = single("order number", Selector::text_exact(order_number));
    if let Some(cell) = resolve(page, &exact, &CascadeOptions::with_timeout(Duration::from_secs(10))).await {
        if let Some(text) = row_of(page, &cell.element, ROW_ANCESTORS).await {
            if text.contains(order_number) {
                return Ok(found(RowSource::ExactText, text));
            }
        }
    }
    debug!("exact order-number match failed, scanning tables");

    if let Some(text) = scan_tables(page, order_number).await {
        return Ok(found(RowSource::Table, text));
    }

    let body = body_or_empty(page).await;
    if body.contains(order_number) {
        let partial = single("order number", Selector::text_contains(order_number));
        if let Some(cell) = resolve(page, &partial, &CascadeOptions::with_timeout(Duration::from_secs(5))).await {
            if let Some(text) = row_of(page, &cell.element, PAGE_ROWS).await {
                if text.contains(order_number) {
                    return Ok(found(RowSource::PageSearch, text));
                }
            }
        }
        return Ok(found(RowSource::BodyText, body));
    }

    warn!(body = %excerpt(&body, FAILURE_EXCERPT_CHARS), "order number not on page");
    Err(ProbeError::not_found(format!("order row {order_number}"), 3))
}

fn found(source: RowSource, text: String) -> OrderRow {
    info!(?source, row = %excerpt(&text, FAILURE_EXCERPT_CHARS), "order row found");
    OrderRow { source, text }
}

/// Find the order row and check status, store, source and date in it.
pub async fn verify_order_in_list<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<OrderRow> {
    let row = find_order_row(page, config).await?;
    for (field, expected) in config.case.row_fields() {
        assert_contains(field, expected, &row.text)?;
    }
    info!(order = %config.case.order_number, "order list verified");
    Ok(row)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, Screen, ScriptedPage};

    const ORDERS: &str = "https://saas-boh-qa.example/store-supply/demand-daily";
    const ROW: &str = "342512080002 已审核 WEN测试直营门店01 总部分配 2025-12-08";

    fn orders(screen: Screen) -> ScriptedPage {
        ScriptedPage::new(ORDERS).with_screen(screen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_cell_row() {
        let page = orders(
            Screen::new(ORDERS)
                .body(ROW)
                .with_element(MockElement::new("row").tag("tr").text(ROW))
                .with_element(MockElement::new("cell").tag("td").text("342512080002").inside("row")),
        );
        let row = verify_order_in_list(&page, &ProbeConfig::default()).await.unwrap();
        assert_eq!(row.source, RowSource::ExactText);
        assert_eq!(row.text, ROW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_table_scan() {
        // the number cell is hidden, so only the table scan sees the row
        let page = orders(
            Screen::new(ORDERS)
                .body(ROW)
                .with_element(MockElement::new("table").tag("table").text(format!("订货单号 {ROW}")))
                .with_element(MockElement::new("head").tag("tr").text("订货单号").inside("table"))
                .with_element(MockElement::new("row").tag("tr").text(ROW).inside("table"))
                .with_element(
                    MockElement::new("cell")
                        .tag("td")
                        .text("342512080002")
                        .inside("row")
                        .hidden(),
                ),
        );
        let row = find_order_row(&page, &ProbeConfig::default()).await.unwrap();
        assert_eq!(row.source, RowSource::Table);
        assert_eq!(row.text, ROW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_text_fallback() {
        let page = orders(Screen::new(ORDERS).body(ROW));
        let row = find_order_row(&page, &ProbeConfig::default()).await.unwrap();
        assert_eq!(row.source, RowSource::BodyText);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_order_is_fatal() {
        let page = orders(Screen::new(ORDERS).body("暂无数据"));
        let err = find_order_row(&page, &ProbeConfig::default()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Element not found: order row 342512080002 (3 strategies tried)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_status_fails_assertion() {
        let text = "342512080002 已驳回 WEN测试直营门店01 总部分配 2025-12-08";
        let page = orders(Screen::new(ORDERS).body(text));
        let err = verify_order_in_list(&page, &ProbeConfig::default()).await.unwrap_err();
        assert!(matches!(err, ProbeError::AssertionFailed { ref field, .. } if field == "status"));
    }
}
