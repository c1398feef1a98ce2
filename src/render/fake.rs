// src/render/fake.rs
// =============================================================================
// A scripted in-memory engine for tests.
//
// A FakeSite maps URLs to canned pages. Each page can be slow, fail, emit
// console messages or page errors, and mark some of its images as broken.
// FakeStats counts launches, closes and open sessions so tests can check
// that every browser and tab gets released.
// =============================================================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{
    Browser, DomSnapshot, LaunchOptions, NavigationResponse, PageEvent, RenderError,
    RenderingEngine, RenderingSession,
};
use crate::config::Viewport;

/// One canned page
#[derive(Debug, Clone)]
pub struct FakePage {
    html: String,
    status: Option<u16>,
    delay: Duration,
    events: Vec<PageEvent>,
    broken_images: Vec<String>,
    failure: Option<String>,
    redirect: Option<String>,
}

impl FakePage {
    pub fn html(html: &str) -> Self {
        Self {
            html: html.to_string(),
            status: Some(200),
            delay: Duration::ZERO,
            events: Vec::new(),
            broken_images: Vec::new(),
            failure: None,
            redirect: None,
        }
    }

    /// A page whose navigation fails with `message`
    pub fn failing(message: &str) -> Self {
        let mut page = Self::html("");
        page.failure = Some(message.to_string());
        page
    }

    pub fn status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    /// How long navigation takes
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn event(mut self, event: PageEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Serves this page as if the request was redirected to `final_url`
    pub fn redirect_to(mut self, final_url: &str) -> Self {
        self.redirect = Some(final_url.to_string());
        self
    }

    /// Marks an image (by absolute src) as failing to load
    pub fn broken_image(mut self, src: &str) -> Self {
        self.broken_images.push(src.to_string());
        self
    }
}

/// URL -> page map; unknown URLs answer 404 with an empty document
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePage>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

/// Counters shared between the engine and everything it hands out
#[derive(Debug, Default)]
pub struct FakeStats {
    pub launched: AtomicUsize,
    pub browsers_closed: AtomicUsize,
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
    pub viewports: Mutex<Vec<Viewport>>,
}

impl FakeStats {
    pub fn open_sessions(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst) - self.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn navigated(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone)]
pub struct FakeEngine {
    site: Arc<FakeSite>,
    pub stats: Arc<FakeStats>,
    launch_failure: Option<String>,
    session_failures: Arc<Vec<usize>>,
}

impl FakeEngine {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(FakeStats::default()),
            launch_failure: None,
            session_failures: Arc::new(Vec::new()),
        }
    }

    /// An engine whose launch always fails
    pub fn broken(message: &str) -> Self {
        let mut engine = Self::new(FakeSite::new());
        engine.launch_failure = Some(message.to_string());
        engine
    }

    /// Makes opening the n-th session (1-based) fail
    pub fn failing_session(mut self, nth: usize) -> Self {
        let mut failures = (*self.session_failures).clone();
        failures.push(nth);
        self.session_failures = Arc::new(failures);
        self
    }
}

#[async_trait]
impl RenderingEngine for FakeEngine {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn Browser>, RenderError> {
        if let Some(message) = &self.launch_failure {
            return Err(RenderError::Launch(message.clone()));
        }
        self.stats.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowser {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            session_failures: Arc::clone(&self.session_failures),
        }))
    }
}

struct FakeBrowser {
    site: Arc<FakeSite>,
    stats: Arc<FakeStats>,
    session_failures: Arc<Vec<usize>>,
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_session(&self) -> Result<Box<dyn RenderingSession>, RenderError> {
        let nth = self.stats.sessions_opened.fetch_add(1, Ordering::SeqCst) + 1;
        if self.session_failures.contains(&nth) {
            // A session that never opened is not left open
            self.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
            return Err(RenderError::Session(format!("tab {} crashed", nth)));
        }
        Ok(Box::new(FakeSession {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            current: None,
            events: None,
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.stats.browsers_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeSession {
    site: Arc<FakeSite>,
    stats: Arc<FakeStats>,
    current: Option<(String, FakePage)>,
    events: Option<mpsc::UnboundedSender<PageEvent>>,
}

#[async_trait]
impl RenderingSession for FakeSession {
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PageEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        self.stats.viewports.lock().unwrap().push(viewport);
        Ok(())
    }

    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResponse, RenderError> {
        self.stats.navigations.lock().unwrap().push(url.to_string());

        let page = self
            .site
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| FakePage::html("").status(Some(404)));

        if page.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(RenderError::NavigationTimeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(page.delay).await;

        if let Some(tx) = &self.events {
            for event in &page.events {
                let _ = tx.send(event.clone());
            }
        }
        if let Some(message) = &page.failure {
            return Err(RenderError::Session(message.clone()));
        }

        let status = page.status;
        let loaded_url = page.redirect.clone().unwrap_or_else(|| url.to_string());
        self.current = Some((loaded_url, page));
        Ok(NavigationResponse { status })
    }

    async fn title(&mut self) -> Result<String, RenderError> {
        let (url, page) = self.current.as_ref().ok_or(RenderError::NotNavigated)?;
        Ok(DomSnapshot::from_html(&page.html, url).title)
    }

    async fn snapshot(&mut self) -> Result<DomSnapshot, RenderError> {
        let (url, page) = self.current.as_ref().ok_or(RenderError::NotNavigated)?;
        let mut snapshot = DomSnapshot::from_html(&page.html, url);
        for image in &mut snapshot.images {
            let broken = image.src.is_empty() || page.broken_images.contains(&image.src);
            image.complete = !broken;
            image.natural_width = Some(if broken { 0 } else { 100 });
        }
        Ok(snapshot)
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
