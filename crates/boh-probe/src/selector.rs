//! Selectors and target descriptors.
//!
//! A [`Target`] names one logical UI element ("account field", "query
//! button") and carries the ordered selector strategies used to find it.
//! Order encodes specificity: exact names and ids come before generic type
//! selectors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One way of locating an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g. `input[name="account"]`)
    Css(String),
    /// CSS selector filtered to elements whose text contains `text`
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// Innermost elements whose text matches
    Text {
        /// Text to look for
        text: String,
        /// Whole trimmed text must equal `text`
        exact: bool,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a CSS selector with a text filter
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Create an exact text selector
    #[must_use]
    pub fn text_exact(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: true,
        }
    }

    /// Create a substring text selector
    #[must_use]
    pub fn text_contains(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    /// Convert to a JavaScript expression evaluating to an array of elements
    /// below `root` (an expression naming a node, usually `document`).
    #[must_use]
    pub fn to_query(&self, root: &str) -> String {
        match self {
            Self::Css(css) => {
                format!("Array.from({root}.querySelectorAll({}))", js_string(css))
            }
            Self::CssWithText { css, text } => format!(
                "Array.from({root}.querySelectorAll({})).filter(el => (el.textContent || '').includes({}))",
                js_string(css),
                js_string(text)
            ),
            Self::Text { text, exact } => {
                let t = js_string(text);
                let test = if *exact {
                    format!("(el.textContent || '').trim() === {t}")
                } else {
                    format!("(el.textContent || '').includes({t})")
                };
                format!(
                    "Array.from({root}.querySelectorAll('*')).filter(el => {test} && !Array.from(el.children).some(c => (c.textContent || '').includes({t})))"
                )
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text({text:?})"),
            Self::Text { text, exact: true } => write!(f, "text={text:?}"),
            Self::Text { text, exact: false } => write!(f, "text~={text:?}"),
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("\"\""))
}

/// Ordered selector strategies for one logical element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    name: String,
    strategies: Vec<Selector>,
}

impl Target {
    /// Create an empty target
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategies: Vec::new(),
        }
    }

    /// Create a target from a list of CSS selectors
    #[must_use]
    pub fn from_css<I, S>(name: impl Into<String>, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            strategies: selectors.into_iter().map(|s| Selector::Css(s.into())).collect(),
        }
    }

    /// Append a strategy
    #[must_use]
    pub fn or(mut self, selector: Selector) -> Self {
        self.strategies.push(selector);
        self
    }

    /// Append a CSS strategy
    #[must_use]
    pub fn or_css(self, css: impl Into<String>) -> Self {
        self.or(Selector::Css(css.into()))
    }

    /// Logical name used in logs and errors
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strategies in evaluation order
    #[must_use]
    pub fn strategies(&self) -> &[Selector] {
        &self.strategies
    }

    /// Number of strategies
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the target has no strategies
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
