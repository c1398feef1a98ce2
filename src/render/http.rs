// src/render/http.rs
// =============================================================================
// A rendering engine that fetches pages over plain HTTP.
//
// It has no JavaScript runtime and no layout engine, so it approximates what
// a browser would report:
// - the "browser" is a reqwest client with its own connection pool
// - navigation is a GET with a timeout; the status is the response status
// - the DOM snapshot is parsed from the fetched HTML with scraper
// - image load state comes from probing every image URL
// - failed loads are reported on the console stream the way a browser
//   reports "Failed to load resource" errors
//
// Rust concepts:
// - Trait objects: HttpBrowser/HttpSession are handed out as Box<dyn ...>
// - Streams: .buffered() probes images concurrently but keeps their order
// =============================================================================

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{header::CONTENT_LENGTH, Client, StatusCode};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::dom::document_title;
use super::{
    Browser, ConsoleLevel, DomSnapshot, Image, LaunchOptions, NavigationResponse, PageEvent,
    RenderError, RenderingEngine, RenderingSession,
};
use crate::config::Viewport;

// How many image probes a single page may have in flight
const IMAGE_PROBE_CONCURRENCY: usize = 8;
const IMAGE_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine backed by reqwest
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpEngine;

impl HttpEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RenderingEngine for HttpEngine {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Browser>, RenderError> {
        // Nothing runs page code here, so sandboxing only matters to script-capable engines
        debug!(sandbox = options.sandbox, "launching HTTP browser");

        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        Ok(Box::new(HttpBrowser { client }))
    }
}

struct HttpBrowser {
    client: Client,
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_session(&self) -> Result<Box<dyn RenderingSession>, RenderError> {
        Ok(Box::new(HttpSession {
            // Clones share the pool, like tabs share a browser process
            client: self.client.clone(),
            viewport: Viewport::default(),
            page: None,
            events: None,
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        debug!("closing HTTP browser");
        Ok(())
    }
}

// The document we navigated to
struct LoadedPage {
    url: String,
    body: String,
}

struct HttpSession {
    client: Client,
    viewport: Viewport,
    page: Option<LoadedPage>,
    events: Option<mpsc::UnboundedSender<PageEvent>>,
}

impl HttpSession {
    fn loaded(&self) -> Result<&LoadedPage, RenderError> {
        self.page.as_ref().ok_or(RenderError::NotNavigated)
    }

    fn emit(&self, event: PageEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is listening any more
            let _ = tx.send(event);
        }
    }

    fn report_failed_load(&self, status: u16) {
        self.emit(PageEvent::Console {
            level: ConsoleLevel::Error,
            text: format!(
                "Failed to load resource: the server responded with a status of {}",
                status
            ),
        });
    }
}

#[async_trait]
impl RenderingSession for HttpSession {
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PageEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        self.viewport = viewport;
        Ok(())
    }

    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResponse, RenderError> {
        let response = self
            .client
            .get(url)
            // Client hint so responsive servers pick the desktop layout
            .header("Viewport-Width", self.viewport.width.to_string())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| navigation_error(url, timeout, e))?;

        let status = response.status().as_u16();
        if status >= 400 {
            self.report_failed_load(status);
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(url, timeout, e))?;

        self.page = Some(LoadedPage {
            url: final_url,
            body,
        });

        Ok(NavigationResponse {
            status: Some(status),
        })
    }

    async fn title(&mut self) -> Result<String, RenderError> {
        let page = self.loaded()?;
        Ok(document_title(&page.body))
    }

    async fn snapshot(&mut self) -> Result<DomSnapshot, RenderError> {
        let page = self.loaded()?;
        // Parsing is synchronous; the scraper document never lives across an await
        let mut snapshot = DomSnapshot::from_html(&page.body, &page.url);

        let client = &self.client;
        let srcs: Vec<String> = snapshot.images.iter().map(|image| image.src.clone()).collect();
        let probes = srcs.into_iter().map(|src| probe_image(client, src));
        let outcomes: Vec<ImageProbe> = stream::iter(probes)
            .buffered(IMAGE_PROBE_CONCURRENCY)
            .collect()
            .await;

        for (image, outcome) in snapshot.images.iter_mut().zip(outcomes) {
            if let Some(status) = outcome.failed_status {
                self.report_failed_load(status);
            }
            apply_probe(image, &outcome);
        }

        Ok(snapshot)
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

fn navigation_error(url: &str, timeout: Duration, error: reqwest::Error) -> RenderError {
    if error.is_timeout() {
        RenderError::NavigationTimeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        RenderError::Http(error)
    }
}

// What we learned about one image
#[derive(Debug, Default, PartialEq, Eq)]
struct ImageProbe {
    loaded: bool,
    /// Content-Length when the server sent one
    length: Option<u64>,
    /// Set when the server answered with an error status
    failed_status: Option<u16>,
}

async fn probe_image(client: &Client, src: String) -> ImageProbe {
    if src.is_empty() {
        return ImageProbe::default();
    }
    if let Some(data) = src.strip_prefix("data:") {
        // Inline image: loaded if there is any payload after the comma
        let payload = data.split_once(',').map(|(_, p)| p).unwrap_or("");
        return ImageProbe {
            loaded: true,
            length: Some(payload.len() as u64),
            failed_status: None,
        };
    }
    if !(src.starts_with("http://") || src.starts_with("https://")) {
        return ImageProbe::default();
    }

    let mut response = client.head(&src).timeout(IMAGE_PROBE_TIMEOUT).send().await;

    // Some servers refuse HEAD, fall back to GET for those
    if let Ok(r) = &response {
        if matches!(
            r.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            response = client.get(&src).timeout(IMAGE_PROBE_TIMEOUT).send().await;
        }
    }

    match response {
        Ok(r) if r.status().is_success() => ImageProbe {
            loaded: true,
            length: r
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok()),
            failed_status: None,
        },
        Ok(r) => ImageProbe {
            loaded: false,
            length: None,
            failed_status: Some(r.status().as_u16()),
        },
        Err(e) => {
            debug!(src = %src, error = %e, "image probe failed");
            ImageProbe::default()
        }
    }
}

fn apply_probe(image: &mut Image, probe: &ImageProbe) {
    image.complete = probe.loaded;
    // An empty body decodes to a zero-width image; otherwise the width is unknown
    image.natural_width = match (probe.loaded, probe.length) {
        (true, Some(0)) | (false, _) => Some(0),
        _ => None,
    };
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why Box<dyn Browser> instead of a generic?
//    - The crawler picks its engine at runtime (real HTTP vs. test fake)
//    - A trait object lets one JobStore hold any engine behind one type
//    - #[async_trait] makes async methods usable on trait objects
//
// 2. What does self: Box<Self> mean?
//    - close() takes ownership of the boxed value
//    - After close() nobody can use the browser or session again
//
// 3. Why .buffered() and not .buffer_unordered()?
//    - buffered() runs futures concurrently but yields results in input order
//    - That lets us zip the results back onto the images they belong to
// -----------------------------------------------------------------------------
