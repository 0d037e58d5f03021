//! Scripted [`PageDriver`] implementation.

use crate::driver::{ClickOptions, LoadState, NavigationOptions, PageDriver, ScrollPosition};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::Selector;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// PNG signature returned by [`ScriptedPage::screenshot`]
const PNG_STUB: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// What happens when an element is clicked or a key is pressed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Effect {
    /// Nothing observable
    #[default]
    None,
    /// Switch to the screen registered for this URL
    Navigate(String),
    /// Make the named elements of the current screen visible
    Reveal(Vec<String>),
    /// The action itself fails with a driver error
    Fail(String),
}

impl Effect {
    /// Navigate effect
    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::Navigate(url.into())
    }

    /// Reveal effect
    #[must_use]
    pub fn reveal<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Reveal(names.into_iter().map(Into::into).collect())
    }
}

/// When a screen's body text stops showing its loading placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    /// Loaded from the first read
    #[default]
    Immediate,
    /// The first `n` reads return the loading text
    AfterReads(u32),
    /// Loaded once the screen has been reloaded
    AfterReload,
    /// Never loads
    Never,
}

/// One element on a scripted screen
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MockElement {
    name: String,
    tags: Vec<String>,
    text: String,
    visible: bool,
    attrs: HashMap<String, String>,
    value: String,
    checked: bool,
    parent: Option<String>,
    on_click: Effect,
}

impl MockElement {
    /// Visible element with no tags
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            ..Self::default()
        }
    }

    /// Selector (rendered with its `Display` form) that finds this element
    #[must_use]
    pub fn tag(mut self, selector: impl Into<String>) -> Self {
        self.tags.push(selector.into());
        self
    }

    /// Text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Start hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Start checked
    #[must_use]
    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    /// Name of the containing element
    #[must_use]
    pub fn inside(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Click effect
    #[must_use]
    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click = effect;
        self
    }

    fn matches_css(&self, css: &str) -> bool {
        css.split(',')
            .map(str::trim)
            .any(|part| self.tags.iter().any(|t| t == part))
    }
}

/// One document the page can show
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Screen {
    url: String,
    title: String,
    body: String,
    loading_body: Option<String>,
    readiness: Readiness,
    elements: Vec<MockElement>,
    on_enter: Effect,
    reads: u32,
    reloads: u32,
}

impl Screen {
    /// Empty screen at `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Document title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Body text once loaded
    #[must_use]
    pub fn body(mut self, text: impl Into<String>) -> Self {
        self.body = text.into();
        self
    }

    /// Body text shown until `readiness` is met
    #[must_use]
    pub fn loading(mut self, text: impl Into<String>, readiness: Readiness) -> Self {
        self.loading_body = Some(text.into());
        self.readiness = readiness;
        self
    }

    /// Add an element (document order is insertion order)
    #[must_use]
    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Effect of pressing Enter on this screen
    #[must_use]
    pub fn on_enter(mut self, effect: Effect) -> Self {
        self.on_enter = effect;
        self
    }

    fn is_loaded(&self) -> bool {
        if self.loading_body.is_none() {
            return true;
        }
        match self.readiness {
            Readiness::Immediate => true,
            Readiness::AfterReads(n) => self.reads > n,
            Readiness::AfterReload => self.reloads > 0,
            Readiness::Never => false,
        }
    }

    fn is_leaf(&self, index: usize) -> bool {
        let name = &self.elements[index].name;
        !self
            .elements
            .iter()
            .any(|e| e.parent.as_deref() == Some(name.as_str()))
    }

    fn is_descendant(&self, index: usize, ancestor: &str) -> bool {
        let mut parent = self.elements[index].parent.clone();
        while let Some(name) = parent {
            if name == ancestor {
                return true;
            }
            parent = self
                .elements
                .iter()
                .find(|e| e.name == name)
                .and_then(|e| e.parent.clone());
        }
        false
    }

    fn matches(&self, index: usize, selector: &Selector) -> bool {
        let element = &self.elements[index];
        let rendered = selector.to_string();
        if element.tags.iter().any(|t| *t == rendered) {
            return true;
        }
        match selector {
            Selector::Css(css) => element.matches_css(css),
            Selector::CssWithText { css, text } => {
                element.matches_css(css) && element.text.contains(text.as_str())
            }
            Selector::Text { text, exact } => {
                let hit = if *exact {
                    element.text.trim() == text
                } else {
                    element.text.contains(text.as_str())
                };
                hit && self.is_leaf(index)
            }
        }
    }
}

/// Handle to an element of a [`ScriptedPage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockHandle {
    screen: String,
    index: usize,
    generation: u64,
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    screens: Vec<Screen>,
    generation: u64,
    failing_selectors: HashSet<String>,
    failing_urls: HashSet<String>,
    failing_keys: HashSet<String>,
    stalled_states: HashSet<LoadState>,
    query_log: Vec<String>,
    clicks: Vec<String>,
    keys: Vec<String>,
    viewport: Option<(u32, u32)>,
}

impl PageState {
    fn screen_index(&self, url: &str) -> Option<usize> {
        self.screens.iter().position(|s| s.url == url).or_else(|| {
            self.screens
                .iter()
                .enumerate()
                .filter(|(_, s)| url.starts_with(s.url.as_str()))
                .max_by_key(|(_, s)| s.url.len())
                .map(|(i, _)| i)
        })
    }

    fn current(&self) -> Option<usize> {
        self.screen_index(&self.url)
    }

    fn navigate(&mut self, url: &str) {
        self.url = url.to_string();
        self.generation += 1;
    }

    fn element(&self, handle: &MockHandle) -> ProbeResult<(usize, &MockElement)> {
        if handle.generation != self.generation {
            return Err(ProbeError::driver("stale element handle"));
        }
        let screen = self
            .screens
            .iter()
            .position(|s| s.url == handle.screen)
            .ok_or_else(|| ProbeError::driver("element detached"))?;
        let element = self.screens[screen]
            .elements
            .get(handle.index)
            .ok_or_else(|| ProbeError::driver("element detached"))?;
        Ok((screen, element))
    }

    fn apply(&mut self, effect: &Effect) -> ProbeResult<()> {
        match effect {
            Effect::None => Ok(()),
            Effect::Navigate(url) => {
                self.navigate(url);
                Ok(())
            }
            Effect::Reveal(names) => {
                if let Some(screen) = self.current() {
                    for element in &mut self.screens[screen].elements {
                        if names.contains(&element.name) {
                            element.visible = true;
                        }
                    }
                }
                Ok(())
            }
            Effect::Fail(message) => Err(ProbeError::driver(message.clone())),
        }
    }

    fn query(&mut self, scope: Option<&MockHandle>, selector: &Selector) -> ProbeResult<Vec<MockHandle>> {
        let rendered = selector.to_string();
        self.query_log.push(rendered.clone());
        if self.failing_selectors.contains(&rendered) {
            return Err(ProbeError::driver(format!("invalid selector: {rendered}")));
        }
        let scope_name = match scope {
            Some(handle) => Some(self.element(handle)?.1.name.clone()),
            None => None,
        };
        let Some(screen_idx) = self.current() else {
            return Ok(Vec::new());
        };
        let screen = &self.screens[screen_idx];
        Ok((0..screen.elements.len())
            .filter(|&i| screen.matches(i, selector))
            .filter(|&i| {
                scope_name
                    .as_deref()
                    .map_or(true, |ancestor| screen.is_descendant(i, ancestor))
            })
            .map(|index| MockHandle {
                screen: screen.url.clone(),
                index,
                generation: self.generation,
            })
            .collect())
    }
}

/// In-memory [`PageDriver`]
#[derive(Debug)]
pub struct ScriptedPage {
    state: Mutex<PageState>,
}

impl ScriptedPage {
    /// Page currently showing `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(PageState {
                url: url.into(),
                ..PageState::default()
            }),
        }
    }

    /// Register a screen
    #[must_use]
    pub fn with_screen(self, screen: Screen) -> Self {
        self.lock().screens.push(screen);
        self
    }

    /// Make queries with this selector (by `Display` form) fail
    #[must_use]
    pub fn failing_selector(self, selector: impl Into<String>) -> Self {
        self.lock().failing_selectors.insert(selector.into());
        self
    }

    /// Make navigation to this URL fail
    #[must_use]
    pub fn failing_goto(self, url: impl Into<String>) -> Self {
        self.lock().failing_urls.insert(url.into());
        self
    }

    /// Make pressing this key fail
    #[must_use]
    pub fn failing_key(self, key: impl Into<String>) -> Self {
        self.lock().failing_keys.insert(key.into());
        self
    }

    /// Load state that is never reached
    #[must_use]
    pub fn stalled(self, state: LoadState) -> Self {
        self.lock().stalled_states.insert(state);
        self
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current URL
    #[must_use]
    pub fn current_url(&self) -> String {
        self.lock().url.clone()
    }

    /// Selectors queried so far, in order
    #[must_use]
    pub fn query_log(&self) -> Vec<String> {
        self.lock().query_log.clone()
    }

    /// Forget recorded queries
    pub fn clear_query_log(&self) {
        self.lock().query_log.clear();
    }

    /// Names of clicked elements, in order
    #[must_use]
    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    /// Keys pressed, in order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys.clone()
    }

    /// Number of reloads of the screen at `url`
    #[must_use]
    pub fn reloads(&self, url: &str) -> u32 {
        let state = self.lock();
        state
            .screen_index(url)
            .map_or(0, |i| state.screens[i].reloads)
    }

    /// Value of the named input on any screen
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<String> {
        self.find_named(name, |e| e.value.clone())
    }

    /// Checked state of the named element on any screen
    #[must_use]
    pub fn checked_state(&self, name: &str) -> Option<bool> {
        self.find_named(name, |e| e.checked)
    }

    /// Viewport last set
    #[must_use]
    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.lock().viewport
    }

    fn find_named<T>(&self, name: &str, f: impl Fn(&MockElement) -> T) -> Option<T> {
        let state = self.lock();
        state
            .screens
            .iter()
            .flat_map(|s| s.elements.iter())
            .find(|e| e.name == name)
            .map(f)
    }

    fn with_element_mut<T>(
        &self,
        handle: &MockHandle,
        f: impl FnOnce(&mut MockElement) -> T,
    ) -> ProbeResult<T> {
        let mut state = self.lock();
        let (screen, _) = state.element(handle)?;
        Ok(f(&mut state.screens[screen].elements[handle.index]))
    }

    fn read_element<T>(&self, handle: &MockHandle, f: impl FnOnce(&MockElement) -> T) -> ProbeResult<T> {
        let state = self.lock();
        let (_, element) = state.element(handle)?;
        Ok(f(element))
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    type Element = MockHandle;

    async fn goto(&self, url: &str, _options: NavigationOptions) -> ProbeResult<()> {
        let mut state = self.lock();
        if state.failing_urls.contains(url) {
            return Err(ProbeError::navigation(url, "net::ERR_ABORTED"));
        }
        state.navigate(url);
        Ok(())
    }

    async fn reload(&self, _wait_until: LoadState) -> ProbeResult<()> {
        let mut state = self.lock();
        if let Some(screen) = state.current() {
            state.screens[screen].reloads += 1;
        }
        state.generation += 1;
        Ok(())
    }

    async fn url(&self) -> ProbeResult<String> {
        Ok(self.current_url())
    }

    async fn title(&self) -> ProbeResult<String> {
        let state = self.lock();
        Ok(state
            .current()
            .map(|i| state.screens[i].title.clone())
            .unwrap_or_default())
    }

    async fn body_text(&self) -> ProbeResult<String> {
        let mut state = self.lock();
        let Some(i) = state.current() else {
            return Ok(String::new());
        };
        let screen = &mut state.screens[i];
        screen.reads += 1;
        if screen.is_loaded() {
            Ok(screen.body.clone())
        } else {
            Ok(screen.loading_body.clone().unwrap_or_default())
        }
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> ProbeResult<()> {
        let stalled = self.lock().stalled_states.contains(&state);
        if stalled {
            tokio::time::sleep(timeout).await;
            return Err(ProbeError::WaitTimeout {
                waited_for: format!("load state {state}"),
                attempts: 1,
                elapsed_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn query_all(&self, selector: &Selector) -> ProbeResult<Vec<MockHandle>> {
        self.lock().query(None, selector)
    }

    async fn query_within(&self, scope: &MockHandle, selector: &Selector) -> ProbeResult<Vec<MockHandle>> {
        self.lock().query(Some(scope), selector)
    }

    async fn closest(&self, element: &MockHandle, css: &str) -> ProbeResult<Option<MockHandle>> {
        let state = self.lock();
        let (screen_idx, _) = state.element(element)?;
        let screen = &state.screens[screen_idx];
        let mut index = Some(element.index);
        while let Some(i) = index {
            if screen.elements[i].matches_css(css) {
                return Ok(Some(MockHandle {
                    screen: screen.url.clone(),
                    index: i,
                    generation: state.generation,
                }));
            }
            index = screen.elements[i]
                .parent
                .as_ref()
                .and_then(|p| screen.elements.iter().position(|e| &e.name == p));
        }
        Ok(None)
    }

    async fn is_visible(&self, element: &MockHandle) -> ProbeResult<bool> {
        self.read_element(element, |e| e.visible)
    }

    async fn text_content(&self, element: &MockHandle) -> ProbeResult<String> {
        self.read_element(element, |e| e.text.clone())
    }

    async fn attribute(&self, element: &MockHandle, name: &str) -> ProbeResult<Option<String>> {
        self.read_element(element, |e| e.attrs.get(name).cloned())
    }

    async fn click(&self, element: &MockHandle, options: ClickOptions) -> ProbeResult<()> {
        let mut state = self.lock();
        let (_, target) = state.element(element)?;
        if !target.visible && !options.force {
            return Err(ProbeError::driver(format!("{} is not visible", target.name)));
        }
        let name = target.name.clone();
        let effect = target.on_click.clone();
        state.clicks.push(name);
        state.apply(&effect)
    }

    async fn fill(&self, element: &MockHandle, value: &str) -> ProbeResult<()> {
        let readonly = self.read_element(element, |e| e.attrs.contains_key("readonly"))?;
        if readonly {
            return Err(ProbeError::driver("element is readonly"));
        }
        self.with_element_mut(element, |e| e.value = value.to_string())
    }

    async fn input_value(&self, element: &MockHandle) -> ProbeResult<String> {
        self.read_element(element, |e| e.value.clone())
    }

    async fn is_checked(&self, element: &MockHandle) -> ProbeResult<bool> {
        self.read_element(element, |e| e.checked)
    }

    async fn check(&self, element: &MockHandle) -> ProbeResult<()> {
        self.with_element_mut(element, |e| e.checked = true)
    }

    async fn scroll_into_view(&self, element: &MockHandle) -> ProbeResult<()> {
        self.read_element(element, |_| ())
    }

    async fn scroll_page(&self, _position: ScrollPosition) -> ProbeResult<()> {
        Ok(())
    }

    async fn press_key(&self, key: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        if state.failing_keys.contains(key) {
            return Err(ProbeError::driver(format!("key {key} rejected")));
        }
        state.keys.push(key.to_string());
        if key == "Enter" {
            if let Some(i) = state.current() {
                let effect = state.screens[i].on_enter.clone();
                return state.apply(&effect);
            }
        }
        Ok(())
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        Ok(PNG_STUB.to_vec())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> ProbeResult<()> {
        self.lock().viewport = Some((width, height));
        Ok(())
    }
}
