// src/analyzer/mod.rs
// =============================================================================
// The page analyzer: turns one rendered page into a set of findings.
//
// How it works:
// 1. Subscribe to the session's console / page-error stream
// 2. Set a fixed viewport so layout-dependent checks are repeatable
// 3. Navigate (bounded by the navigation timeout) and time the load
// 4. Read the title and take a DOM snapshot
// 5. Run the rules in rules.rs over the snapshot
// 6. Optionally probe the page's links for reachability
//
// The analyzer knows nothing about the crawl: no depth, no visited set, and
// its findings carry no page URL. The session is always closed before
// analyze() returns, whatever happened.
// =============================================================================

pub mod rules;

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::checker::LinkProbe;
use crate::config::{Settings, Viewport};
use crate::findings::{
    BrokenLink, ConsoleLog, DeadButton, FormIssue, JsError, MissingAlt, MissingImage,
};
use crate::render::{ConsoleLevel, DomSnapshot, PageEvent, RenderError, RenderingSession};

pub use rules::resolve_link;

/// The knobs the analyzer needs
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerSettings {
    pub navigation_timeout: Duration,
    pub viewport: Viewport,
}

impl From<&Settings> for AnalyzerSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            navigation_timeout: settings.navigation_timeout,
            viewport: settings.viewport,
        }
    }
}

/// Every finding for a single page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageFindings {
    pub broken_links: Vec<BrokenLink>,
    pub js_errors: Vec<JsError>,
    pub missing_images: Vec<MissingImage>,
    pub console_logs: Vec<ConsoleLog>,
    pub dead_buttons: Vec<DeadButton>,
    pub missing_alt: Vec<MissingAlt>,
    pub form_issues: Vec<FormIssue>,
}

/// A successfully analyzed page
#[derive(Debug, Clone, PartialEq)]
pub struct PageAnalysis {
    /// URL of the document that was loaded, after any redirects
    ///
    /// Relative links on the page resolve against this, not the requested URL.
    pub page_url: String,
    pub title: String,
    pub load_time: Duration,
    /// 0 when the engine could not observe a status
    pub status_code: u16,
    /// Raw hrefs in document order, not deduplicated
    pub links: Vec<String>,
    pub findings: PageFindings,
}

/// A page that could not be analyzed, already converted into a finding
#[derive(Debug, Clone, Error)]
#[error("{}", .error.message)]
pub struct PageFailure {
    pub error: JsError,
}

impl PageFailure {
    pub(crate) fn from_render(error: RenderError) -> Self {
        Self {
            error: JsError {
                message: format!("Page analysis failed: {}", error),
            },
        }
    }
}

// What we pulled out of the session before closing it
struct Inspection {
    load_time: Duration,
    status_code: u16,
    title: String,
    snapshot: DomSnapshot,
}

/// Analyzes a single page
///
/// Takes ownership of the session and always closes it.
pub async fn analyze(
    mut session: Box<dyn RenderingSession>,
    url: &str,
    settings: &AnalyzerSettings,
    probe: Option<&dyn LinkProbe>,
) -> Result<PageAnalysis, PageFailure> {
    let mut events = session.subscribe();

    let inspection = inspect(session.as_mut(), url, settings).await;

    if let Err(e) = session.close().await {
        warn!(url = %url, error = %e, "failed to close page session");
    }

    let Inspection {
        load_time,
        status_code,
        title,
        snapshot,
    } = inspection.map_err(PageFailure::from_render)?;

    let (console_logs, js_errors) = drain_events(&mut events);

    let links = rules::outbound_links(&snapshot);
    let broken_links = match probe {
        Some(probe) => check_links(probe, &snapshot.url, &links).await,
        None => Vec::new(),
    };

    let findings = PageFindings {
        broken_links,
        js_errors,
        missing_images: rules::unloaded_images(&snapshot),
        console_logs,
        dead_buttons: rules::dead_controls(&snapshot),
        missing_alt: rules::images_missing_alt(&snapshot),
        form_issues: rules::form_issues(&snapshot),
    };

    debug!(
        url = %url,
        status = status_code,
        load_ms = load_time.as_millis() as u64,
        links = links.len(),
        "page analyzed"
    );

    Ok(PageAnalysis {
        page_url: snapshot.url,
        title,
        load_time,
        status_code,
        links,
        findings,
    })
}

async fn inspect(
    session: &mut dyn RenderingSession,
    url: &str,
    settings: &AnalyzerSettings,
) -> Result<Inspection, RenderError> {
    session.set_viewport(settings.viewport).await?;

    let timeout = settings.navigation_timeout;
    let started = Instant::now();
    // The engine is asked to respect the timeout too; this is the hard bound
    let response = tokio::time::timeout(timeout, session.navigate(url, timeout))
        .await
        .map_err(|_| RenderError::NavigationTimeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        })??;
    let load_time = started.elapsed();

    let title = session.title().await?;
    let snapshot = session.snapshot().await?;

    Ok(Inspection {
        load_time,
        status_code: response.status.unwrap_or(0),
        title,
        snapshot,
    })
}

// Splits buffered page events into console findings and script errors
fn drain_events(
    events: &mut mpsc::UnboundedReceiver<PageEvent>,
) -> (Vec<ConsoleLog>, Vec<JsError>) {
    let mut console_logs = Vec::new();
    let mut js_errors = Vec::new();

    while let Ok(event) = events.try_recv() {
        match event {
            PageEvent::Console { level, text }
                if matches!(level, ConsoleLevel::Error | ConsoleLevel::Warning) =>
            {
                console_logs.push(ConsoleLog { level, text });
            }
            PageEvent::Console { .. } => {}
            PageEvent::PageError { message } => js_errors.push(JsError { message }),
        }
    }

    (console_logs, js_errors)
}

async fn check_links(probe: &dyn LinkProbe, page_url: &str, links: &[String]) -> Vec<BrokenLink> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };

    let mut targets: Vec<String> = Vec::new();
    for link in links {
        if let Some(resolved) = resolve_link(&base, link) {
            let resolved = resolved.to_string();
            if !targets.contains(&resolved) {
                targets.push(resolved);
            }
        }
    }
    if targets.is_empty() {
        return Vec::new();
    }

    probe
        .check(targets)
        .await
        .into_iter()
        .filter(|result| !result.is_ok())
        .map(|result| BrokenLink {
            status: result.status.label().to_string(),
            url: result.url,
            message: result.message,
        })
        .collect()
}
