//! Line-item table check on the detail page.

use super::{body_or_empty, scroll_nudge};
use crate::config::ProbeConfig;
use crate::driver::{LoadState, PageDriver};
use crate::resolver::resolve_rows;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Selector, Target};
use crate::verify::assert_contains;
use crate::wait::{pause_for, tolerate_load_state};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Header labels that mark a row as the table header
const HEADER_LABELS: [&str; 2] = ["商品编号", "商品名称"];

/// Row scan used when no cascade strategy found a row
const ROW_SCAN: &str = "table tr, tbody tr";

/// What line-item verification found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItemsOutcome {
    /// Matching rows
    pub rows: usize,
    /// Selector that produced them
    pub selector: Option<String>,
}

/// Rows of the line-item table for `product_code`
#[must_use]
pub fn line_item_rows(product_code: &str) -> Target {
    Target::new("line item rows")
        .or(Selector::css_with_text("table tr", product_code))
        .or_css("[class*=\"product-row\"]")
        .or_css("[class*=\"item-row\"]")
        .or_css("tr:has([class*=\"product-code\"])")
        .or_css("tbody tr")
        .or_css("table tr")
}

/// A data row of `product_code` (not the header)
#[must_use]
pub fn is_item_row(text: &str, product_code: &str) -> bool {
    text.contains(product_code) && !HEADER_LABELS.iter().any(|label| text.contains(label))
}

/// Check the line-item table holds exactly the configured number of rows
/// for the product, and that its code and name are shown.
pub async fn verify_line_items<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<LineItemsOutcome> {
    let case = &config.case;
    let code = case.product_code.as_str();
    tolerate_load_state(page, LoadState::DomContentLoaded, config.timings.load_state_timeout).await;
    pause_for(config.timings.settle).await;

    let keep = |text: &str| is_item_row(text, code);
    let mut found = resolve_rows(page, &line_item_rows(code), keep).await;

    let body = body_or_empty(page).await;
    if found.is_empty() && body.contains(code) {
        debug!("no row strategy matched, scanning every table row");
        scroll_nudge(page, config).await;
        found = resolve_rows(page, &Target::new("line item rows").or_css(ROW_SCAN), keep).await;
    }

    let rows = found.len();
    let selector = found.first().map(|row| row.selector.to_string());
    if rows != case.line_items {
        warn!(rows, expected = case.line_items, "line item count mismatch");
        return Err(ProbeError::AssertionFailed {
            field: "line item rows".into(),
            expected: case.line_items.to_string(),
            actual: rows.to_string(),
        });
    }

    assert_contains("product code", code, &body)?;
    assert_contains("product name", &case.product_name, &body)?;
    info!(rows, selector = ?selector, "line items verified");
    Ok(LineItemsOutcome { rows, selector })
}
