//! Browser-automation capability set.
//!
//! [`PageDriver`] is the seam to whatever automation library owns the
//! browser session. Flow steps only ever talk to a page through it, so the
//! same flows run against Chrome (feature `browser`) and against
//! [`crate::mock::ScriptedPage`] in tests.

use crate::result::ProbeResult;
use crate::selector::Selector;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Page load states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// Wait for the `load` event to fire
    #[default]
    Load,
    /// Wait for `DOMContentLoaded` event
    DomContentLoaded,
    /// Wait for network to be idle (no requests for 500ms)
    NetworkIdle,
}

impl LoadState {
    /// Get the event name for this load state
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

/// Options for a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickOptions {
    /// Skip actionability checks (overlays, animations)
    pub force: bool,
}

impl ClickOptions {
    /// Forced click
    #[must_use]
    pub const fn forced() -> Self {
        Self { force: true }
    }
}

/// Where to scroll the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPosition {
    /// Top of the document
    Top,
    /// Bottom of the document
    Bottom,
}

/// Navigation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationOptions {
    /// Load state that ends the navigation
    pub wait_until: LoadState,
    /// Upper bound for the navigation
    pub timeout: Duration,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            wait_until: LoadState::Load,
            timeout: Duration::from_secs(30),
        }
    }
}

impl NavigationOptions {
    /// Set load state
    #[must_use]
    pub const fn with_wait_until(mut self, state: LoadState) -> Self {
        self.wait_until = state;
        self
    }

    /// Set timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A page owned by one scenario for its whole duration.
///
/// Implementations report invalid or unsupported selectors and stale element
/// handles as [`crate::ProbeError::Driver`].
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Handle to an element on the current document
    type Element: Clone + fmt::Debug + Send + Sync;

    /// Navigate to `url`
    async fn goto(&self, url: &str, options: NavigationOptions) -> ProbeResult<()>;

    /// Reload the current document
    async fn reload(&self, wait_until: LoadState) -> ProbeResult<()>;

    /// Current URL
    async fn url(&self) -> ProbeResult<String>;

    /// Document title
    async fn title(&self) -> ProbeResult<String>;

    /// Text content of `<body>`
    async fn body_text(&self) -> ProbeResult<String>;

    /// Block until the page reaches `state` or `timeout` elapses
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> ProbeResult<()>;

    /// All elements matching `selector`, in document order
    async fn query_all(&self, selector: &Selector) -> ProbeResult<Vec<Self::Element>>;

    /// Elements matching `selector` inside `scope`
    async fn query_within(
        &self,
        scope: &Self::Element,
        selector: &Selector,
    ) -> ProbeResult<Vec<Self::Element>>;

    /// Nearest ancestor-or-self of `element` matching the CSS list `css`
    async fn closest(&self, element: &Self::Element, css: &str)
        -> ProbeResult<Option<Self::Element>>;

    /// Whether the element is rendered and visible
    async fn is_visible(&self, element: &Self::Element) -> ProbeResult<bool>;

    /// Text content of the element
    async fn text_content(&self, element: &Self::Element) -> ProbeResult<String>;

    /// Attribute value, if present
    async fn attribute(&self, element: &Self::Element, name: &str) -> ProbeResult<Option<String>>;

    /// Click the element
    async fn click(&self, element: &Self::Element, options: ClickOptions) -> ProbeResult<()>;

    /// Replace the value of an input
    async fn fill(&self, element: &Self::Element, value: &str) -> ProbeResult<()>;

    /// Current value of an input
    async fn input_value(&self, element: &Self::Element) -> ProbeResult<String>;

    /// Whether a checkbox is checked
    async fn is_checked(&self, element: &Self::Element) -> ProbeResult<bool>;

    /// Check a checkbox
    async fn check(&self, element: &Self::Element) -> ProbeResult<()>;

    /// Scroll the element into view
    async fn scroll_into_view(&self, element: &Self::Element) -> ProbeResult<()>;

    /// Scroll the whole page
    async fn scroll_page(&self, position: ScrollPosition) -> ProbeResult<()>;

    /// Press a key on the focused element (e.g. `"Enter"`)
    async fn press_key(&self, key: &str) -> ProbeResult<()>;

    /// Full-page PNG screenshot
    async fn screenshot(&self) -> ProbeResult<Vec<u8>>;

    /// Resize the viewport
    async fn set_viewport(&self, width: u32, height: u32) -> ProbeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_state_event_names() {
        assert_eq!(LoadState::Load.event_name(), "load");
        assert_eq!(LoadState::DomContentLoaded.event_name(), "DOMContentLoaded");
        assert_eq!(LoadState::NetworkIdle.to_string(), "networkidle");
        assert_eq!(LoadState::default(), LoadState::Load);
    }

    #[test]
    fn test_navigation_options_chained() {
        let opts = NavigationOptions::default()
            .with_wait_until(LoadState::DomContentLoaded)
            .with_timeout(Duration::from_secs(10));
        assert_eq!(opts.wait_until, LoadState::DomContentLoaded);
        assert_eq!(opts.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_click_options() {
        assert!(ClickOptions::forced().force);
        assert!(!ClickOptions::default().force);
    }
}
