//! Run configuration.
//!
//! [`ProbeConfig`] is resolved once at startup from three layers, lowest
//! first: the built-in profile of the selected environment, an optional YAML
//! file, then process environment variables. Flow steps receive it by
//! reference and never read the environment themselves.

use crate::case::OrderCase;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{millis, PollPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment selector variable
pub const ENV_VAR: &str = "ENV";

/// Default order-module path
pub const DEFAULT_ORDER_PATH: &str = "/store-supply/demand-daily";

/// Deployment the run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// QA deployment
    #[default]
    Test,
    /// Production deployment
    Production,
}

impl Environment {
    /// Parse an environment name; anything unknown selects [`Environment::Test`]
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Test,
        }
    }

    /// Canonical name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name
    pub account: String,
    /// Password
    pub password: String,
    /// Brand alias
    pub brand_alias: String,
}

impl Credentials {
    /// Copy safe to print: password replaced by `***`
    #[must_use]
    pub fn masked(&self) -> Self {
        Self {
            account: self.account.clone(),
            password: "***".into(),
            brand_alias: self.brand_alias.clone(),
        }
    }

    /// First three characters of the account followed by `***`
    #[must_use]
    pub fn account_hint(&self) -> String {
        let head: String = self.account.chars().take(3).collect();
        format!("{head}***")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("password", &"***")
            .field("brand_alias", &self.brand_alias)
            .finish()
    }
}

/// URLs and credentials of one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    /// Selected environment
    pub environment: Environment,
    /// Authentication service
    pub auth_base_url: String,
    /// Login page
    pub login_url: String,
    /// Back-office application
    pub boh_base_url: String,
    /// Credentials
    pub credentials: Credentials,
}

impl EnvironmentProfile {
    /// Built-in profile
    #[must_use]
    pub fn builtin(environment: Environment) -> Self {
        let (auth, boh) = match environment {
            Environment::Test => ("https://saas-auth-qa.example", "https://saas-boh-qa.example"),
            Environment::Production => ("https://auth.example", "https://boh.example"),
        };
        Self {
            environment,
            auth_base_url: auth.into(),
            login_url: full_url(auth, "/page/login"),
            boh_base_url: boh.into(),
            credentials: Credentials {
                account: "admin".into(),
                password: "admin@123".into(),
                brand_alias: "hex".into(),
            },
        }
    }
}

/// Every bound used by the flow steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Visibility timeout per cascade strategy
    #[serde(with = "millis")]
    pub strategy_timeout: Duration,
    /// Visibility timeout per query-button strategy
    #[serde(with = "millis")]
    pub query_button_timeout: Duration,
    /// Redirect away from the login page
    pub login_redirect: PollPolicy,
    /// First wait for detail fields
    pub detail_wait: PollPolicy,
    /// Wait for detail fields after the reload
    pub detail_reload_wait: PollPolicy,
    /// Page navigation
    #[serde(with = "millis")]
    pub navigation_timeout: Duration,
    /// Load-state waits
    #[serde(with = "millis")]
    pub load_state_timeout: Duration,
    /// Advisory waits raced against the query click
    #[serde(with = "millis")]
    pub advisory_timeout: Duration,
    /// Short pause after an interaction
    #[serde(with = "millis")]
    pub settle: Duration,
    /// Pause after the query for results to render
    #[serde(with = "millis")]
    pub result_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            strategy_timeout: Duration::from_secs(2),
            query_button_timeout: Duration::from_secs(3),
            login_redirect: PollPolicy::elapsed(Duration::from_secs(30), Duration::from_secs(1)),
            detail_wait: PollPolicy::attempts(15, Duration::from_millis(500)),
            detail_reload_wait: PollPolicy::attempts(15, Duration::from_secs(1)),
            navigation_timeout: Duration::from_secs(30),
            load_state_timeout: Duration::from_secs(10),
            advisory_timeout: Duration::from_secs(20),
            settle: Duration::from_millis(500),
            result_settle: Duration::from_secs(2),
        }
    }
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a window
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Chromium executable, if not on the default path
    pub chromium_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self::for_ci(false)
    }
}

impl BrowserSettings {
    /// CI runs headless at 1920x1080; local runs show the window at 1440x900
    #[must_use]
    pub fn for_ci(ci: bool) -> Self {
        let (viewport_width, viewport_height) = if ci { (1920, 1080) } else { (1440, 900) };
        Self {
            headless: ci,
            viewport_width,
            viewport_height,
            chromium_path: None,
        }
    }

    /// Force the CI window: headless at 1920x1080, other fields kept
    pub fn apply_ci(&mut self) {
        let ci = Self::for_ci(true);
        self.headless = ci.headless;
        self.viewport_width = ci.viewport_width;
        self.viewport_height = ci.viewport_height;
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CredentialsFile {
    account: Option<String>,
    password: Option<String>,
    brand_alias: Option<String>,
}

/// YAML overlay; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    environment: Option<Environment>,
    auth_base_url: Option<String>,
    login_url: Option<String>,
    boh_base_url: Option<String>,
    order_path: Option<String>,
    credentials: CredentialsFile,
    timings: Option<Timings>,
    browser: Option<BrowserSettings>,
    case: Option<OrderCase>,
}

/// Immutable configuration of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeConfig {
    /// Deployment URLs and credentials
    pub profile: EnvironmentProfile,
    /// Path of the order module below `boh_base_url`
    pub order_path: String,
    /// Wait bounds
    pub timings: Timings,
    /// Browser settings
    pub browser: BrowserSettings,
    /// Expected order data
    pub case: OrderCase,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Test)
    }
}

impl ProbeConfig {
    /// Built-in configuration of an environment
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            profile: EnvironmentProfile::builtin(environment),
            order_path: DEFAULT_ORDER_PATH.into(),
            timings: Timings::default(),
            browser: BrowserSettings::default(),
            case: OrderCase::default(),
        }
    }

    /// Resolve from the process environment and an optional YAML file
    pub fn from_env(file: Option<&Path>) -> ProbeResult<Self> {
        Self::resolve(|key| std::env::var(key).ok(), file)
    }

    /// Resolve using `lookup` in place of the process environment.
    ///
    /// An explicit `environment` argument (e.g. from a CLI flag) wins over
    /// both the file and `ENV`.
    pub fn resolve_with<F>(lookup: F, file: Option<&Path>, environment: Option<Environment>) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overlay = match file {
            Some(path) => load_file(path)?,
            None => ConfigFile::default(),
        };

        let environment = environment
            .or_else(|| lookup(ENV_VAR).map(|name| Environment::from_name(&name)))
            .or(overlay.environment)
            .unwrap_or_default();
        let ci = lookup("CI").is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let mut config = Self::for_environment(environment);
        config.apply(overlay);
        if ci {
            config.browser.apply_ci();
        }

        if let Some(url) = lookup("BOH_BASE_URL").filter(|v| !v.is_empty()) {
            config.profile.boh_base_url = url;
        }
        let creds = &mut config.profile.credentials;
        if let Some(v) = lookup("BOH_ACCOUNT") {
            creds.account = v;
        }
        if let Some(v) = lookup("BOH_PASSWORD") {
            creds.password = v;
        }
        if let Some(v) = lookup("BOH_BRAND_ALIAS") {
            creds.brand_alias = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// [`Self::resolve_with`] without an explicit environment
    pub fn resolve<F>(lookup: F, file: Option<&Path>) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve_with(lookup, file, None)
    }

    fn apply(&mut self, overlay: ConfigFile) {
        if let Some(url) = overlay.auth_base_url {
            self.profile.login_url = full_url(&url, "/page/login");
            self.profile.auth_base_url = url;
        }
        if let Some(url) = overlay.login_url {
            self.profile.login_url = url;
        }
        if let Some(url) = overlay.boh_base_url {
            self.profile.boh_base_url = url;
        }
        if let Some(path) = overlay.order_path {
            self.order_path = path;
        }
        let creds = &mut self.profile.credentials;
        if let Some(v) = overlay.credentials.account {
            creds.account = v;
        }
        if let Some(v) = overlay.credentials.password {
            creds.password = v;
        }
        if let Some(v) = overlay.credentials.brand_alias {
            creds.brand_alias = v;
        }
        if let Some(timings) = overlay.timings {
            self.timings = timings;
        }
        if let Some(browser) = overlay.browser {
            self.browser = browser;
        }
        if let Some(case) = overlay.case {
            self.case = case;
        }
    }

    fn validate(&self) -> ProbeResult<()> {
        for (name, url) in [
            ("login_url", &self.profile.login_url),
            ("boh_base_url", &self.profile.boh_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ProbeError::config(format!("{name} must be an http(s) URL, got {url:?}")));
            }
        }
        if self.profile.credentials.account.is_empty() {
            return Err(ProbeError::config("account must not be empty"));
        }
        if login_path(&self.profile.login_url).is_none() {
            return Err(ProbeError::config(format!(
                "login_url must include the login page path, got {:?}",
                self.profile.login_url
            )));
        }
        if self.page_marker().is_empty() {
            return Err(ProbeError::config(format!(
                "order_path must name a page, got {:?}",
                self.order_path
            )));
        }
        if self.case.order_number.is_empty() {
            return Err(ProbeError::config("case.order_number must not be empty"));
        }
        Ok(())
    }

    /// Absolute URL of the order list
    #[must_use]
    pub fn order_page_url(&self) -> String {
        full_url(&self.profile.boh_base_url, &self.order_path)
    }

    /// Last segment of the order path, used to recognise the page
    #[must_use]
    pub fn page_marker(&self) -> &str {
        self.order_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(self.order_path.as_str())
    }

    /// Path of the login page (e.g. `/page/login`)
    #[must_use]
    pub fn login_path(&self) -> &str {
        login_path(&self.profile.login_url).unwrap_or("/")
    }

    /// Copy safe to print
    #[must_use]
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.profile.credentials = self.profile.credentials.masked();
        copy
    }
}

/// Path part of `url` without query or fragment; `None` for the bare root
fn login_path(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = rest.find('/').map_or("", |i| &rest[i..]);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    (!path.trim_end_matches('/').is_empty()).then_some(path)
}

fn load_file(path: &Path) -> ProbeResult<ConfigFile> {
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    Ok(serde_yaml_ng::from_str(&text)?)
}

/// Join a base URL and a module path
///
/// ```
/// use boh_probe::config::full_url;
/// assert_eq!(
///     full_url("https://boh.example/", "store-supply/demand-daily"),
///     "https://boh.example/store-supply/demand-daily"
/// );
/// ```
#[must_use]
pub fn full_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
