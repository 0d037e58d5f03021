//! Chrome `DevTools` backend for [`PageDriver`].
//!
//! Element handles are ids into a registry the page keeps on
//! `window.__bohProbe`. Every element operation is a JavaScript evaluation
//! against that registry; navigation discards it, so handles taken before a
//! navigation report a stale-handle driver error.

use crate::config::BrowserSettings;
use crate::driver::{ClickOptions, LoadState, NavigationOptions, PageDriver, ScrollPosition};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::Selector;
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Expression yielding the page-side handle registry
const REGISTRY: &str =
    "(window.__bohProbe || (window.__bohProbe = { next: 1, els: new Map() }))";

/// Network quiet period that counts as idle
const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);

/// Load-state poll interval
const LOAD_STATE_POLL: Duration = Duration::from_millis(100);

/// A launched Chromium with its event-handler task
#[derive(Debug)]
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    settings: BrowserSettings,
}

impl BrowserSession {
    /// Launch Chromium per `settings`
    pub async fn launch(settings: &BrowserSettings) -> ProbeResult<Self> {
        let mut builder = BrowserConfig::builder().window_size(settings.viewport_width, settings.viewport_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(|message| ProbeError::BrowserLaunch { message })?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| ProbeError::BrowserLaunch { message: e.to_string() })?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!(headless = settings.headless, "browser launched");

        Ok(Self {
            browser,
            handler,
            settings: settings.clone(),
        })
    }

    /// Open a blank page
    pub async fn new_page(&self) -> ProbeResult<CdpPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        Ok(CdpPage { page })
    }

    /// Settings the browser was launched with
    #[must_use]
    pub const fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Close the browser and stop the handler task
    pub async fn close(mut self) -> ProbeResult<()> {
        let closed = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::driver(e.to_string()));
        self.handler.abort();
        closed
    }
}

/// Handle to an element registered on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CdpElement(u64);

/// One Chromium tab driven over CDP
#[derive(Debug, Clone)]
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> ProbeResult<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        result.into_value().map_err(|e| ProbeError::driver(e.to_string()))
    }

    /// Run `body` with `el` bound to the registered element
    async fn on_element<T: DeserializeOwned>(&self, element: &CdpElement, body: &str) -> ProbeResult<T> {
        self.eval(element_script(element.0, body)).await
    }

    async fn ready_state(&self) -> ProbeResult<(String, usize)> {
        self.eval(
            "[document.readyState, performance.getEntriesByType('resource').length]".to_string(),
        )
        .await
    }
}

fn register(list: &str) -> String {
    format!("(() => {{ const r = {REGISTRY}; return {list}.map(el => {{ const id = r.next++; r.els.set(id, el); return id; }}); }})()")
}

fn element_script(id: u64, body: &str) -> String {
    format!(
        "(() => {{ const r = {REGISTRY}; const el = r.els.get({id}); \
         if (!el || !el.isConnected) throw new Error('stale element handle'); {body} }})()"
    )
}

const VISIBLE: &str = "const s = getComputedStyle(el); const b = el.getBoundingClientRect(); \
     const visible = s.visibility !== 'hidden' && s.display !== 'none' && b.width > 0 && b.height > 0;";

fn load_state_reached(state: LoadState, ready: &str) -> bool {
    match state {
        LoadState::DomContentLoaded => ready != "loading",
        LoadState::Load | LoadState::NetworkIdle => ready == "complete",
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    type Element = CdpElement;

    async fn goto(&self, url: &str, options: NavigationOptions) -> ProbeResult<()> {
        match tokio::time::timeout(options.timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ProbeError::navigation(url, e.to_string())),
            Err(_) => {
                return Err(ProbeError::navigation(
                    url,
                    format!("timed out after {}ms", options.timeout.as_millis()),
                ))
            }
        }
        self.wait_for_load_state(options.wait_until, options.timeout).await
    }

    async fn reload(&self, wait_until: LoadState) -> ProbeResult<()> {
        self.page
            .reload()
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        self.wait_for_load_state(wait_until, Duration::from_secs(30)).await
    }

    async fn url(&self) -> ProbeResult<String> {
        let url = self.page.url().await.map_err(|e| ProbeError::driver(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn title(&self) -> ProbeResult<String> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn body_text(&self) -> ProbeResult<String> {
        self.eval("document.body ? document.body.innerText : ''".to_string()).await
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> ProbeResult<()> {
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut resources: Option<(usize, Instant)> = None;
        loop {
            attempts += 1;
            if let Ok((ready, count)) = self.ready_state().await {
                if load_state_reached(state, &ready) {
                    if state != LoadState::NetworkIdle {
                        return Ok(());
                    }
                    match resources {
                        Some((seen, since)) if seen == count => {
                            if since.elapsed() >= NETWORK_IDLE_QUIET {
                                return Ok(());
                            }
                        }
                        _ => resources = Some((count, Instant::now())),
                    }
                }
            }
            if start.elapsed() >= timeout {
                return Err(ProbeError::WaitTimeout {
                    waited_for: format!("load state {state}"),
                    attempts,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(LOAD_STATE_POLL).await;
        }
    }

    async fn query_all(&self, selector: &Selector) -> ProbeResult<Vec<CdpElement>> {
        let ids: Vec<u64> = self.eval(register(&selector.to_query("document"))).await?;
        Ok(ids.into_iter().map(CdpElement).collect())
    }

    async fn query_within(&self, scope: &CdpElement, selector: &Selector) -> ProbeResult<Vec<CdpElement>> {
        let body = format!(
            "return {list}.map(c => {{ const id = r.next++; r.els.set(id, c); return id; }});",
            list = selector.to_query("el")
        );
        let ids: Vec<u64> = self.on_element(scope, &body).await?;
        Ok(ids.into_iter().map(CdpElement).collect())
    }

    async fn closest(&self, element: &CdpElement, css: &str) -> ProbeResult<Option<CdpElement>> {
        let css = serde_json::to_string(css)?;
        let body = format!(
            "const c = el.closest({css}); if (!c) return null; const id = r.next++; r.els.set(id, c); return id;"
        );
        let id: Option<u64> = self.on_element(element, &body).await?;
        Ok(id.map(CdpElement))
    }

    async fn is_visible(&self, element: &CdpElement) -> ProbeResult<bool> {
        self.on_element(element, &format!("{VISIBLE} return visible;")).await
    }

    async fn text_content(&self, element: &CdpElement) -> ProbeResult<String> {
        self.on_element(element, "return el.textContent || '';").await
    }

    async fn attribute(&self, element: &CdpElement, name: &str) -> ProbeResult<Option<String>> {
        let name = serde_json::to_string(name)?;
        self.on_element(element, &format!("return el.getAttribute({name});")).await
    }

    async fn click(&self, element: &CdpElement, options: ClickOptions) -> ProbeResult<()> {
        let body = if options.force {
            "el.click(); return true;".to_string()
        } else {
            format!(
                "el.scrollIntoView({{ block: 'center' }}); {VISIBLE} \
                 if (!visible) throw new Error('element is not visible'); el.click(); return true;"
            )
        };
        let _: bool = self.on_element(element, &body).await?;
        Ok(())
    }

    async fn fill(&self, element: &CdpElement, value: &str) -> ProbeResult<()> {
        let value = serde_json::to_string(value)?;
        let body = format!(
            "if (el.readOnly || el.disabled) throw new Error('element is not editable'); \
             el.focus(); \
             const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
             const setter = Object.getOwnPropertyDescriptor(proto, 'value').set; \
             setter.call(el, {value}); \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true;"
        );
        let _: bool = self.on_element(element, &body).await?;
        Ok(())
    }

    async fn input_value(&self, element: &CdpElement) -> ProbeResult<String> {
        self.on_element(element, "return el.value == null ? '' : String(el.value);").await
    }

    async fn is_checked(&self, element: &CdpElement) -> ProbeResult<bool> {
        self.on_element(element, "return !!el.checked;").await
    }

    async fn check(&self, element: &CdpElement) -> ProbeResult<()> {
        let _: bool = self
            .on_element(element, "if (!el.checked) el.click(); return !!el.checked;")
            .await?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &CdpElement) -> ProbeResult<()> {
        let _: bool = self
            .on_element(element, "el.scrollIntoView({ block: 'center' }); return true;")
            .await?;
        Ok(())
    }

    async fn scroll_page(&self, position: ScrollPosition) -> ProbeResult<()> {
        let y = match position {
            ScrollPosition::Top => "0",
            ScrollPosition::Bottom => "document.body ? document.body.scrollHeight : 0",
        };
        let _: bool = self.eval(format!("(() => {{ window.scrollTo(0, {y}); return true; }})()")).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> ProbeResult<()> {
        let (code, text) = match key {
            "Enter" => (13, Some("\r")),
            "Tab" => (9, None),
            "Escape" => (27, None),
            _ => (0, None),
        };
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind.clone())
                .key(key)
                .code(key)
                .windows_virtual_key_code(code);
            if let (DispatchKeyEventType::KeyDown, Some(text)) = (&kind, text) {
                builder = builder.text(text);
            }
            let params = builder.build().map_err(ProbeError::driver)?;
            self.page
                .execute(params)
                .await
                .map_err(|e| ProbeError::driver(e.to_string()))?;
        }
        debug!(key, "key pressed");
        Ok(())
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .capture_beyond_viewport(true)
            .build();
        let shot = self
            .page
            .execute(params)
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| ProbeError::driver(e.to_string()))
    }

    async fn set_viewport(&self, width: u32, height: u32) -> ProbeResult<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(width))
            .height(i64::from(height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(ProbeError::driver)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        Ok(())
    }
}
