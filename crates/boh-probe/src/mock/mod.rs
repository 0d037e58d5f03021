//! In-memory page for exercising flows without a browser.
//!
//! A [`ScriptedPage`] is a set of [`Screen`]s keyed by URL. Each screen holds
//! [`MockElement`]s tagged with the selectors that should find them, plus a
//! body text that can stay on a loading placeholder until it has been read a
//! number of times or the page has been reloaded.
//!
//! ## Example
//!
//! ```rust
//! use boh_probe::mock::{Effect, MockElement, Screen, ScriptedPage};
//!
//! let page = ScriptedPage::new("https://auth.example/page/login")
//!     .with_screen(
//!         Screen::new("https://auth.example/page/login")
//!             .with_element(MockElement::new("account").tag("input[name=\"account\"]"))
//!             .with_element(
//!                 MockElement::new("submit")
//!                     .tag("button[type=\"submit\"]")
//!                     .on_click(Effect::navigate("https://boh.example/")),
//!             ),
//!     );
//! assert_eq!(page.current_url(), "https://auth.example/page/login");
//! ```

mod scripted_page;

pub use scripted_page::{Effect, MockElement, MockHandle, Readiness, Screen, ScriptedPage};
