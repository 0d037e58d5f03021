//! boh-probe: resilient browser flows for back-office order checks
//!
//! Drives a back-office web application through a fixed business scenario
//! (log in, check the tenant, query the daily order list, open an order,
//! verify its header and line items) on pages whose markup and timing are
//! unreliable.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ ProbeConfig  │──►│ OrderScenario│──►│  flows::*    │──►│  PageDriver  │
//! │ (resolved    │   │ (steps,      │   │ (cascade +   │   │ (CDP page or │
//! │  once)       │   │  report)     │   │  poll loop)  │   │  ScriptedPage│
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Two primitives carry every step:
//!
//! - [`resolve`]: walk a [`Target`]'s ordered [`Selector`] strategies and
//!   return the first visible match.
//! - [`poll`]: evaluate a condition at an interval until it holds or a
//!   [`PollPolicy`] bound (attempts or elapsed time) is exhausted.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_futures))]

pub mod artifacts;
pub mod case;
pub mod config;
pub mod driver;
pub mod flows;
pub mod mock;
pub mod resolver;
mod result;
pub mod scenario;
pub mod selector;
pub mod verify;
pub mod wait;

/// Chrome `DevTools` backend (requires chromium)
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc)]
pub mod browser;

pub use artifacts::{ArtifactSink, NoArtifacts, ScreenshotOnFailure};
#[cfg(feature = "browser")]
pub use browser::{BrowserSession, CdpElement, CdpPage};
pub use case::{DateRange, OrderCase};
pub use config::{
    full_url, BrowserSettings, Credentials, Environment, EnvironmentProfile, ProbeConfig, Timings,
};
pub use driver::{ClickOptions, LoadState, NavigationOptions, PageDriver, ScrollPosition};
pub use resolver::{first_present, require, resolve, resolve_in, resolve_rows, CascadeOptions, Resolved, RowMatch};
pub use result::{ProbeError, ProbeResult, Severity};
pub use scenario::{OrderScenario, ScenarioReport, Step, StepRecord, StepStatus};
pub use selector::{Selector, Target};
pub use wait::{poll, poll_until, wait_for_url, PollBound, PollPolicy, UrlPattern, WaitOutcome};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::artifacts::*;
    pub use super::case::*;
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::flows::*;
    pub use super::resolver::*;
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::selector::*;
    pub use super::wait::*;
}
