// src/render/mod.rs
// =============================================================================
// The rendering engine seam.
//
// The crawler never talks to a browser directly. It goes through three
// object-safe async traits, one per lifetime:
//
//   RenderingEngine  - launches one isolated Browser per crawl job
//   Browser          - opens independent tabs (RenderingSession)
//   RenderingSession - one tab: viewport, navigation, title, DOM snapshot,
//                      and a stream of console messages / page errors
//
// Submodules:
// - dom: the structured DOM snapshot the analyzer rules work on
// - http: an engine built on reqwest + scraper
// - fake: a scripted in-memory engine for tests
// =============================================================================

mod dom;
mod http;

#[cfg(test)]
pub mod fake;

pub use dom::{Button, DomSnapshot, FormControl, Image};
pub use http::HttpEngine;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::Viewport;

/// Errors raised by an engine, a browser or a session
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("failed to open page: {0}")]
    Session(String),

    #[error("navigation to {url} timed out after {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    #[error("navigation failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page has not been navigated yet")]
    NotNavigated,

    #[error("DOM access failed: {0}")]
    Dom(String),
}

/// Flags for launching a browser instance
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub sandbox: bool,
    pub user_agent: String,
}

/// What the engine tells us about the main document response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationResponse {
    /// HTTP status, None when the engine could not observe one
    pub status: Option<u16>,
}

/// Severity of a console message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Debug,
    Log,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warning => "warning",
            ConsoleLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Something the page emitted while it was open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Console { level: ConsoleLevel, text: String },
    /// An uncaught script error
    PageError { message: String },
}

#[async_trait]
pub trait RenderingEngine: Send + Sync {
    /// Starts a fresh, isolated browser instance
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Browser>, RenderError>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    /// Opens a new independent page/tab
    async fn new_session(&self) -> Result<Box<dyn RenderingSession>, RenderError>;

    /// Shuts the browser down, releasing everything it holds
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

#[async_trait]
pub trait RenderingSession: Send {
    /// Returns a receiver for everything the page emits from now on
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PageEvent>;

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RenderError>;

    /// Loads `url` and waits for the network to go quiet, up to `timeout`
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResponse, RenderError>;

    /// The resolved document title
    async fn title(&mut self) -> Result<String, RenderError>;

    /// Extracts the structured DOM snapshot of the loaded page
    async fn snapshot(&mut self) -> Result<DomSnapshot, RenderError>;

    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}
