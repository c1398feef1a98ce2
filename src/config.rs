// src/config.rs
// =============================================================================
// Runtime settings for crawls and the HTTP API.
//
// Settings come from three places, later ones winning:
// 1. Built-in defaults (Settings::default)
// 2. SITE_AUDITOR_* environment variables (optionally from a .env file)
// 3. Command-line flags (applied in main.rs)
// =============================================================================

use std::time::Duration;

/// Page width and height used for layout-dependent checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Everything a crawl job or the API server needs to know at startup
#[derive(Debug, Clone)]
pub struct Settings {
    /// Page budget used when a request does not give one
    pub default_max_pages: usize,
    /// Depth limit used when a request does not give one
    pub default_max_depth: usize,
    /// Upper bound on a single navigation
    pub navigation_timeout: Duration,
    /// Pages loading slower than this get a SlowPage finding
    pub slow_page_threshold: Duration,
    pub viewport: Viewport,
    /// Whether the engine should run its browser sandboxed
    pub sandbox: bool,
    pub user_agent: String,
    /// Probe every discovered link for reachability
    pub check_links: bool,
    /// How many link probes may be in flight at once
    pub link_check_concurrency: usize,
    pub link_check_timeout: Duration,
    /// Address the API server listens on
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_max_pages: 50,
            default_max_depth: 3,
            navigation_timeout: Duration::from_secs(30),
            slow_page_threshold: Duration::from_millis(3000),
            viewport: Viewport::default(),
            sandbox: true,
            user_agent: format!("site-auditor/{}", env!("CARGO_PKG_VERSION")),
            check_links: true,
            link_check_concurrency: 20,
            link_check_timeout: Duration::from_secs(10),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Settings {
    /// Builds settings from the environment, falling back to defaults
    ///
    /// Recognised variables (all optional):
    /// - SITE_AUDITOR_MAX_PAGES
    /// - SITE_AUDITOR_MAX_DEPTH
    /// - SITE_AUDITOR_NAV_TIMEOUT_SECS
    /// - SITE_AUDITOR_SLOW_PAGE_MS
    /// - SITE_AUDITOR_SANDBOX (true/false)
    /// - SITE_AUDITOR_USER_AGENT
    /// - SITE_AUDITOR_CHECK_LINKS (true/false)
    /// - SITE_AUDITOR_LINK_CONCURRENCY
    /// - SITE_AUDITOR_LINK_TIMEOUT_SECS
    /// - SITE_AUDITOR_BIND_ADDR
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Split out from from_env so tests don't have to touch the process env
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let flag = |key: &str| lookup(key).and_then(|s| parse_bool(&s));

        Self {
            default_max_pages: parsed("SITE_AUDITOR_MAX_PAGES")
                .map(|n| n as usize)
                .unwrap_or(defaults.default_max_pages),
            default_max_depth: parsed("SITE_AUDITOR_MAX_DEPTH")
                .map(|n| n as usize)
                .unwrap_or(defaults.default_max_depth),
            navigation_timeout: parsed("SITE_AUDITOR_NAV_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.navigation_timeout),
            slow_page_threshold: parsed("SITE_AUDITOR_SLOW_PAGE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.slow_page_threshold),
            viewport: defaults.viewport,
            sandbox: flag("SITE_AUDITOR_SANDBOX").unwrap_or(defaults.sandbox),
            user_agent: lookup("SITE_AUDITOR_USER_AGENT")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.user_agent),
            check_links: flag("SITE_AUDITOR_CHECK_LINKS").unwrap_or(defaults.check_links),
            link_check_concurrency: parsed("SITE_AUDITOR_LINK_CONCURRENCY")
                .map(|n| (n as usize).max(1))
                .unwrap_or(defaults.link_check_concurrency),
            link_check_timeout: parsed("SITE_AUDITOR_LINK_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.link_check_timeout),
            bind_addr: lookup("SITE_AUDITOR_BIND_ADDR")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.bind_addr),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
