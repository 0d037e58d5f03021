//! Flow steps of the order scenario.
//!
//! Each step is a linear sequence built from the cascade resolver and the
//! poll loop. Steps take the page and the run configuration by reference and
//! return a small outcome value describing which fallbacks were used.
//!
//! | Step / element                  | On exhaustion                         |
//! |---------------------------------|---------------------------------------|
//! | account / password field        | fatal `ElementNotFound`               |
//! | brand alias, agreement box      | warn, continue                        |
//! | login button                    | press Enter                           |
//! | login redirect                  | fatal `NavigationFailed`              |
//! | tenant name                     | fatal `AssertionFailed`               |
//! | order page navigation           | fatal unless URL already correct      |
//! | date input missing              | warn, skip that bound                 |
//! | calendar selection              | type the date                         |
//! | typed date entry fails          | warn, continue                        |
//! | query button                    | press Enter                           |
//! | Enter key also fails            | fatal `ElementNotFound`               |
//! | order row                       | fatal `ElementNotFound`               |
//! | detail link                     | warn, continue                        |
//! | detail placeholders post-reload | fatal `WaitTimeout`                   |
//! | any field assertion             | fatal `AssertionFailed`               |

pub mod date_range;
pub mod line_items;
pub mod login;
pub mod navigation;
pub mod order_detail;
pub mod order_list;
pub mod tenant;

pub use date_range::{select_date_range_and_query, DateEntry, DateRangeOutcome, QueryTrigger};
pub use line_items::{verify_line_items, LineItemsOutcome};
pub use login::{login, LoginOutcome, SubmitMethod};
pub use navigation::{ensure_on_order_page, navigate_to_order_page};
pub use order_detail::{open_order_detail, verify_order_detail, DetailOutcome, DetailOpened};
pub use order_list::{find_order_row, verify_order_in_list, OrderRow, RowSource};
pub use tenant::{verify_tenant, TenantTier};

use crate::config::ProbeConfig;
use crate::driver::{PageDriver, ScrollPosition};
use crate::resolver::CascadeOptions;
use crate::selector::{Selector, Target};
use crate::wait::pause_for;
use tracing::debug;

/// Ancestors that count as the row of a matched cell
pub(crate) const ROW_ANCESTORS: &str = "tr, [role=\"row\"], [class*=\"row\"], [class*=\"item\"]";

/// One-strategy target
pub(crate) fn single(name: &str, selector: Selector) -> Target {
    Target::new(name).or(selector)
}

/// Cascade options for ordinary fields
pub(crate) fn field_cascade(config: &ProbeConfig) -> CascadeOptions {
    CascadeOptions::with_timeout(config.timings.strategy_timeout)
}

/// Body text, empty when it cannot be read
pub(crate) async fn body_or_empty<P: PageDriver>(page: &P) -> String {
    match page.body_text().await {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "body text unavailable");
            String::new()
        }
    }
}

/// Scroll to the bottom and back to the top to trigger lazy rendering
pub(crate) async fn scroll_nudge<P: PageDriver>(page: &P, config: &ProbeConfig) {
    for position in [ScrollPosition::Bottom, ScrollPosition::Top] {
        if let Err(e) = page.scroll_page(position).await {
            debug!(error = %e, "scroll failed");
        }
        pause_for(config.timings.settle).await;
    }
}

/// Text around the first keyword found in `text` (case-insensitive)
pub(crate) fn keyword_context(text: &str, keywords: &[&str]) -> Option<String> {
    let lower = text.to_lowercase();
    keywords.iter().find_map(|keyword| {
        let idx = lower.find(&keyword.to_lowercase())?;
        let mut before: Vec<char> = lower[..idx].chars().rev().take(50).collect();
        before.reverse();
        let after: String = lower[idx..].chars().take(100).collect();
        Some(format!("{}{after}", before.into_iter().collect::<String>()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_context() {
        let text = "请输入 用户名或密码错误 请重试";
        let ctx = keyword_context(text, &["captcha", "用户名或密码"]);
        assert_eq!(ctx.as_deref(), Some("请输入 用户名或密码错误 请重试"));
        assert!(keyword_context("all good", &["error"]).is_none());
        assert!(keyword_context("Server ERROR", &["error"]).is_some());
    }

    #[test]
    fn test_single_target() {
        let t = single("x", Selector::css("#x"));
        assert_eq!(t.len(), 1);
        assert_eq!(t.name(), "x");
    }
}
