//! Login step.
//!
//! LoadPage → LocateFields → FillForm → Submit → AwaitRedirect. The only
//! success criterion is leaving the login path within the redirect bound.

use super::{body_or_empty, field_cascade, keyword_context, single};
use crate::config::ProbeConfig;
use crate::driver::{ClickOptions, LoadState, NavigationOptions, PageDriver};
use crate::resolver::{require, resolve, CascadeOptions};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Selector, Target};
use crate::verify::{excerpt, FAILURE_EXCERPT_CHARS, LOG_EXCERPT_CHARS};
use crate::wait::{pause_for, poll, tolerate_load_state};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Words in the page text that hint at a rejected login
pub const ERROR_KEYWORDS: &[&str] = &["错误", "失败", "error", "用户名或密码", "验证码", "captcha"];

/// How the form was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMethod {
    /// A login button was clicked
    Button,
    /// No button was found; Enter was pressed
    EnterKey,
}

/// What the login step did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    /// URL after the redirect
    pub landed_url: String,
    /// Submission path taken
    pub submit: SubmitMethod,
    /// Whether a brand-alias field was found and filled
    pub brand_alias_filled: bool,
    /// Whether an agreement checkbox was ticked
    pub agreement_checked: bool,
    /// Polls until the redirect was observed
    pub redirect_attempts: u32,
}

/// Account input
#[must_use]
pub fn account_field() -> Target {
    Target::from_css(
        "account field",
        [
            "input[name=\"account\"]",
            "input[name=\"username\"]",
            "input[id=\"account\"]",
            "input[id=\"username\"]",
            "input[placeholder*=\"账号\"]",
            "input[placeholder*=\"用户名\"]",
            "input[type=\"text\"]",
        ],
    )
}

/// Password input
#[must_use]
pub fn password_field() -> Target {
    Target::from_css(
        "password field",
        [
            "input[name=\"password\"]",
            "input[id=\"password\"]",
            "input[type=\"password\"]",
        ],
    )
}

/// Brand alias input
#[must_use]
pub fn brand_alias_field() -> Target {
    Target::from_css(
        "brand alias field",
        [
            "input[name*=\"brand\"]",
            "input[name*=\"alias\"]",
            "input[id*=\"brand\"]",
            "input[id*=\"alias\"]",
            "input[placeholder*=\"品牌\"]",
            "input[placeholder*=\"别名\"]",
        ],
    )
}

/// Terms-of-use checkbox
#[must_use]
pub fn agreement_checkbox() -> Target {
    Target::from_css(
        "agreement checkbox",
        [
            "input[type=\"checkbox\"]",
            "[class*=\"agreement\"] input",
            "[class*=\"protocol\"] input",
            "input[name*=\"agreement\"]",
            "input[name*=\"protocol\"]",
        ],
    )
}

/// Submit button
#[must_use]
pub fn login_button() -> Target {
    Target::new("login button")
        .or(Selector::css_with_text("button", "登录"))
        .or(Selector::css_with_text("button", "登陆"))
        .or_css("button[type=\"submit\"]")
        .or_css("input[type=\"submit\"]")
        .or_css("button.login")
        .or_css(".login-button")
        .or_css("[class*=\"login\"] button")
        .or(Selector::css_with_text("button", "Login"))
        .or(Selector::css_with_text("button", "Sign in"))
        .or_css("[class*=\"login-btn\"]")
        .or_css("[class*=\"submit\"]")
}

/// Error and notice banners
#[must_use]
pub fn notice_banner() -> Target {
    Target::from_css(
        "notice",
        [
            "[class*=\"error\"]",
            "[class*=\"alert\"]",
            "[class*=\"message\"]",
            ".ant-message",
            ".ant-notification",
            "[role=\"alert\"]",
        ],
    )
}

/// Log the first 200 characters of every visible notice banner
async fn log_notices<P: PageDriver>(page: &P) {
    let quick = CascadeOptions::with_timeout(Duration::from_secs(1));
    for selector in notice_banner().strategies() {
        let Some(hit) = resolve(page, &single("notice", selector.clone()), &quick).await else {
            continue;
        };
        if let Ok(text) = page.text_content(&hit.element).await {
            if !text.trim().is_empty() {
                warn!(selector = %selector, text = %excerpt(text.trim(), LOG_EXCERPT_CHARS), "notice on page");
            }
        }
    }
}

/// Tick the first visible unchecked agreement checkbox
async fn check_agreement<P: PageDriver>(page: &P) -> bool {
    let quick = CascadeOptions::with_timeout(Duration::from_secs(1));
    for selector in agreement_checkbox().strategies() {
        let Some(hit) = resolve(page, &single("agreement checkbox", selector.clone()), &quick).await else {
            continue;
        };
        if matches!(page.is_checked(&hit.element).await, Ok(false)) {
            match page.check(&hit.element).await {
                Ok(()) => {
                    info!("agreement checkbox ticked");
                    return true;
                }
                Err(e) => debug!(error = %e, "agreement checkbox rejected"),
            }
        }
    }
    false
}

/// Log in with the configured credentials and wait for the redirect.
pub async fn login<P: PageDriver>(page: &P, config: &ProbeConfig) -> ProbeResult<LoginOutcome> {
    let profile = &config.profile;
    let timings = &config.timings;
    let creds = &profile.credentials;
    let cascade = field_cascade(config);

    info!(url = %profile.login_url, "opening login page");
    page.goto(
        &profile.login_url,
        NavigationOptions::default()
            .with_wait_until(LoadState::DomContentLoaded)
            .with_timeout(timings.navigation_timeout),
    )
    .await
    .map_err(|e| ProbeError::navigation(&profile.login_url, e.to_string()))?;
    tolerate_load_state(page, LoadState::DomContentLoaded, timings.load_state_timeout).await;
    pause_for(timings.settle).await;

    let account = require(page, &account_field(), &cascade).await?;
    page.fill(&account.element, &creds.account).await?;
    let password = require(page, &password_field(), &cascade).await?;
    page.fill(&password.element, &creds.password).await?;

    let brand = resolve(page, &brand_alias_field(), &cascade).await;
    let brand_alias_filled = match &brand {
        Some(hit) => match page.fill(&hit.element, &creds.brand_alias).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "brand alias field rejected input, continuing");
                false
            }
        },
        None => {
            warn!("brand alias field not found, continuing");
            false
        }
    };
    let agreement_checked = check_agreement(page).await;

    pause_for(timings.settle).await;
    let account_value = page.input_value(&account.element).await.unwrap_or_default();
    let password_value = page.input_value(&password.element).await.unwrap_or_default();
    let brand_value = match &brand {
        Some(hit) => page.input_value(&hit.element).await.unwrap_or_default(),
        None => String::new(),
    };
    let account_head: String = account_value.chars().take(3).collect();
    let password_mask = if password_value.is_empty() { "empty" } else { "***" };
    info!(account = %format!("{account_head}***"), password = password_mask, brand = %brand_value, "form filled");

    let submit = match resolve(page, &login_button(), &cascade).await {
        Some(button) => {
            pause_for(timings.settle).await;
            if let Err(e) = page.click(&button.element, ClickOptions::default()).await {
                warn!(error = %e, "login click failed, checking URL anyway");
            }
            SubmitMethod::Button
        }
        None => {
            warn!("login button not found, pressing Enter");
            if let Err(e) = page.press_key("Enter").await {
                warn!(error = %e, "Enter rejected");
            }
            SubmitMethod::EnterKey
        }
    };

    tolerate_load_state(page, LoadState::NetworkIdle, timings.load_state_timeout).await;
    log_notices(page).await;

    let path = config.login_path();
    let redirect = poll("redirect away from the login page", &timings.login_redirect, move |attempt| async move {
        let url = match page.url().await {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "url unavailable");
                return Ok(None);
            }
        };
        debug!(attempt, url = %url, "checking login state");
        if !url.contains(path) {
            return Ok(Some(url));
        }
        let text = body_or_empty(page).await;
        if let Some(context) = keyword_context(&text, ERROR_KEYWORDS) {
            debug!(context = %context, "possible login message");
        }
        Ok(None)
    })
    .await?;

    let Some(landed_url) = redirect.value else {
        let final_url = page.url().await.unwrap_or_default();
        let body = body_or_empty(page).await;
        warn!(url = %final_url, body = %excerpt(&body, FAILURE_EXCERPT_CHARS), "login timed out");
        return Err(ProbeError::navigation(
            &profile.login_url,
            format!(
                "still on the login page after {}ms ({} checks)",
                redirect.elapsed.as_millis(),
                redirect.attempts
            ),
        ));
    };

    tolerate_load_state(page, LoadState::DomContentLoaded, timings.load_state_timeout).await;
    pause_for(timings.settle).await;
    info!(url = %landed_url, "logged in");

    Ok(LoginOutcome {
        landed_url,
        submit,
        brand_alias_filled,
        agreement_checked,
        redirect_attempts: redirect.attempts,
    })
}
