//! Navigation to the order list.

use super::body_or_empty;
use crate::config::ProbeConfig;
use crate::driver::{LoadState, NavigationOptions, PageDriver};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{pause_for, tolerate_load_state};
use tracing::{info, warn};

/// Go straight to the order list and return the URL it landed on.
///
/// A navigation error is tolerated when the page already shows the order
/// list; landing anywhere else is a [`ProbeError::NavigationFailed`].
pub async fn navigate_to_order_page<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<String> {
    let target = config.order_page_url();
    let marker = config.page_marker();
    let timings = &config.timings;
    tolerate_load_state(page, LoadState::DomContentLoaded, timings.load_state_timeout).await;

    info!(url = %target, "navigating to order page");
    let options = NavigationOptions::default()
        .with_wait_until(LoadState::DomContentLoaded)
        .with_timeout(timings.navigation_timeout);
    if let Err(e) = page.goto(&target, options).await {
        let current = page.url().await.unwrap_or_default();
        if current.contains(marker) {
            warn!(error = %e, url = %current, "navigation reported an error but the order page is showing");
            pause_for(timings.settle).await;
            return Ok(current);
        }
        return Err(ProbeError::navigation(target, e.to_string()));
    }

    pause_for(timings.settle).await;
    let landed = page.url().await?;
    if !landed.contains(marker) {
        return Err(ProbeError::navigation(target, format!("landed on {landed}")));
    }
    tolerate_load_state(page, LoadState::DomContentLoaded, timings.load_state_timeout).await;
    let text = body_or_empty(page).await;
    if text.contains("订货") || text.contains("订单") {
        info!(url = %landed, "order page loaded");
    } else {
        warn!(url = %landed, "order page shows no order content yet");
    }
    Ok(landed)
}

/// Re-navigate when the page has left the order list. Returns whether it did.
pub async fn ensure_on_order_page<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<bool> {
    let current = page.url().await.unwrap_or_default();
    if current.contains(config.page_marker()) {
        return Ok(false);
    }
    warn!(url = %current, "left the order page, navigating back");
    navigate_to_order_page(page, config).await?;
    Ok(true)
}
