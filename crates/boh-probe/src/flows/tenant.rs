//! Tenant name check after login.

use super::{body_or_empty, single};
use crate::config::ProbeConfig;
use crate::driver::{LoadState, PageDriver};
use crate::resolver::{resolve, CascadeOptions};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Selector, Target};
use crate::verify::{assert_contains, excerpt, FAILURE_EXCERPT_CHARS};
use crate::wait::{pause_for, tolerate_load_state};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Where the tenant name was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantTier {
    /// Visible text anywhere on the page
    Text,
    /// Text of a visible page header, when no element holding the name
    /// is itself visible (collapsed or truncated labels)
    Header,
    /// Only in the body text
    BodyText,
}

/// Header-like containers
#[must_use]
pub fn header_container() -> Target {
    Target::from_css(
        "header",
        ["header", "nav", "[class*=\"header\"]", "[class*=\"navbar\"]"],
    )
}

/// Check that the logged-in tenant is the expected one.
pub async fn verify_tenant<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<TenantTier> {
    let expected = config.case.tenant.as_str();
    tolerate_load_state(page, LoadState::DomContentLoaded, config.timings.load_state_timeout).await;
    pause_for(config.timings.settle).await;
    if let (Ok(url), Ok(title)) = (page.url().await, page.title().await) {
        debug!(url = %url, title = %title, "tenant check on page");
    }

    let name = single("tenant name", Selector::text_contains(expected));
    let tier = if resolve(page, &name, &CascadeOptions::with_timeout(Duration::from_secs(5)))
        .await
        .is_some()
    {
        Some(TenantTier::Text)
    } else {
        find_in_header(page, expected, config).await
    };

    let body = body_or_empty(page).await;
    let tier = match tier {
        Some(tier) => tier,
        None if body.contains(expected) => TenantTier::BodyText,
        None => {
            return Err(ProbeError::AssertionFailed {
                field: "tenant".into(),
                expected: expected.to_string(),
                actual: excerpt(&body, FAILURE_EXCERPT_CHARS),
            })
        }
    };
    assert_contains("tenant", expected, &body)?;
    info!(tenant = expected, ?tier, "tenant verified");
    Ok(tier)
}

async fn find_in_header<P: PageDriver>(page: &P, expected: &str, config: &ProbeConfig) -> Option<TenantTier> {
    let cascade = CascadeOptions::with_timeout(config.timings.strategy_timeout);
    for selector in header_container().strategies() {
        let Some(header) = resolve(page, &single("header", selector.clone()), &cascade).await else {
            continue;
        };
        match page.text_content(&header.element).await {
            Ok(text) if text.contains(expected) => {
                debug!(selector = %selector, "tenant found in header text");
                return Some(TenantTier::Header);
            }
            Ok(_) => {}
            Err(e) => debug!(selector = %selector, error = %e, "header text unavailable"),
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, Screen, ScriptedPage};

    const HOME: &str = "https://saas-boh-qa.example/home";

    fn page(screen: Screen) -> ScriptedPage {
        ScriptedPage::new(HOME).with_screen(screen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_text() {
        let page = page(
            Screen::new(HOME)
                .body("欢迎 合阔x")
                .with_element(MockElement::new("tenant").tag("span").text("合阔x")),
        );
        assert_eq!(verify_tenant(&page, &ProbeConfig::default()).await.unwrap(), TenantTier::Text);
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_text_tier_when_no_copy_is_visible() {
        let page = page(
            Screen::new(HOME)
                .body("合阔x")
                .with_element(MockElement::new("nav").tag("nav"))
                .with_element(MockElement::new("in-nav").tag("b").text("合阔x").inside("nav").hidden()),
        );
        assert_eq!(
            verify_tenant(&page, &ProbeConfig::default()).await.unwrap(),
            TenantTier::BodyText
        );
        assert!(page.query_log().contains(&"nav".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_header_tier_when_name_label_is_hidden() {
        let page = page(
            Screen::new(HOME)
                .body("合阔x 首页")
                .with_element(MockElement::new("nav").tag("nav").text("合阔x 首页"))
                .with_element(MockElement::new("label").tag("span").text("合阔x").inside("nav").hidden()),
        );
        assert_eq!(
            verify_tenant(&page, &ProbeConfig::default()).await.unwrap(),
            TenantTier::Header
        );
        let log = page.query_log();
        assert!(log.contains(&"header".to_string()));
        assert!(!log.contains(&"[class*=\"header\"]".to_string()), "first visible header wins");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_tenant_fails() {
        let page = page(Screen::new(HOME).body("其他租户"));
        let err = verify_tenant(&page, &ProbeConfig::default()).await.unwrap_err();
        assert!(matches!(err, ProbeError::AssertionFailed { ref field, .. } if field == "tenant"));
    }
}
