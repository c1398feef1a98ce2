// src/checker/http.rs
// =============================================================================
// This module checks if URLs are alive by making HTTP requests.
//
// Key functionality:
// - Makes HTTP HEAD requests (lightweight, no body download)
// - Falls back to GET when a server refuses HEAD
// - Detects various failure modes (404, timeout, SSL errors, etc.)
// - Runs checks concurrently with a cap on requests in flight
// - Remembers every answer for the lifetime of the checker, so a link that
//   appears on fifty pages of one crawl is only requested once
//
// Rust concepts:
// - async/await: For concurrent network I/O
// - Enums: To represent different link states
// - Streams: For processing many items concurrently
// - DashMap: A HashMap that many tasks can read and write at once
// =============================================================================

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt}; // StreamExt gives us .buffer_unordered()
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::LinkProbe;

// Represents the status of a link after checking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "target", rename_all = "snake_case")]
pub enum LinkStatus {
    /// Link is working (2xx)
    Ok,
    /// Link redirects to another URL (301, 302, etc.)
    Redirect(String), // Holds the redirect target URL
    /// Link is broken (404, 410)
    Broken,
    /// Request timed out
    Timeout,
    /// SSL/TLS certificate error
    SslError,
    /// Too many redirects (redirect loop)
    TooManyRedirects,
    /// Could not resolve hostname
    DnsError,
    /// Other error (5xx, connection refused, ...)
    Error,
}

impl LinkStatus {
    /// Short label used in BrokenLink findings
    pub fn label(&self) -> &'static str {
        match self {
            LinkStatus::Ok => "ok",
            LinkStatus::Redirect(_) => "redirect",
            LinkStatus::Broken => "broken",
            LinkStatus::Timeout => "timeout",
            LinkStatus::SslError => "ssl_error",
            LinkStatus::TooManyRedirects => "too_many_redirects",
            LinkStatus::DnsError => "dns_error",
            LinkStatus::Error => "error",
        }
    }
}

// Represents the result of checking a single link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkCheckResult {
    /// The URL that was checked
    pub url: String,
    /// The status of the link
    #[serde(flatten)]
    pub status: LinkStatus,
    /// Optional message with more details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LinkCheckResult {
    /// Returns true for Ok and Redirect statuses
    pub fn is_ok(&self) -> bool {
        matches!(self.status, LinkStatus::Ok | LinkStatus::Redirect(_))
    }
}

/// Checks links over HTTP, caching every answer
pub struct LinkChecker {
    client: Client,
    concurrency: usize,
    cache: DashMap<String, LinkCheckResult>,
}

impl LinkChecker {
    /// Builds a checker with its own HTTP client
    ///
    /// Parameters:
    ///   user_agent: sent with every probe
    ///   timeout: per-request timeout
    ///   concurrency: how many probes may run at once
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        concurrency: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5)) // Follow up to 5 redirects
            .build()?;

        Ok(Self {
            client,
            concurrency: concurrency.max(1),
            cache: DashMap::new(),
        })
    }

    // Checks multiple links concurrently
    //
    // Results come back in the same order as `urls`. Cached answers are
    // reused; everything else goes out at most `concurrency` at a time.
    pub async fn check_links(&self, urls: Vec<String>) -> Vec<LinkCheckResult> {
        let pending: Vec<String> = {
            let mut seen = std::collections::HashSet::new();
            urls.iter()
                .filter(|url| !self.cache.contains_key(*url))
                .filter(|url| seen.insert(url.as_str()))
                .cloned()
                .collect()
        };

        if !pending.is_empty() {
            debug!(count = pending.len(), "probing links");
        }

        // Create a stream of futures, each one checking one URL
        let futures = pending.into_iter().map(|url| {
            let client = self.client.clone(); // Clone the client for each task
            async move { check_single_link(client, url).await }
        });

        // Run up to `concurrency` at once, results arrive as they complete
        let fresh: Vec<LinkCheckResult> = stream::iter(futures)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut fresh: HashMap<String, LinkCheckResult> =
            fresh.into_iter().map(|r| (r.url.clone(), r)).collect();
        for result in fresh.values() {
            self.cache.insert(result.url.clone(), result.clone());
        }

        urls.into_iter()
            .filter_map(|url| {
                fresh
                    .remove(&url)
                    .or_else(|| self.cache.get(&url).map(|r| r.value().clone()))
            })
            .collect()
    }
}

#[async_trait]
impl LinkProbe for LinkChecker {
    async fn check(&self, urls: Vec<String>) -> Vec<LinkCheckResult> {
        self.check_links(urls).await
    }
}

// Checks a single link
//
// HEAD first; if the server says it does not do HEAD, ask again with GET.
async fn check_single_link(client: Client, url: String) -> LinkCheckResult {
    let mut result = client.head(&url).send().await;

    if let Ok(response) = &result {
        if matches!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            result = client.get(&url).send().await;
        }
    }

    match result {
        Ok(response) => {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            classify_status(url, response.status(), location.as_deref())
        }
        Err(e) => categorize_error(url, e),
    }
}

// Turns an HTTP status code into a link status
//
// HTTP status codes:
// - 200-299: Success
// - 300-399: Redirect
// - 404/410: Broken
// - anything else: Error
fn classify_status(url: String, status_code: StatusCode, location: Option<&str>) -> LinkCheckResult {
    let code = status_code.as_u16();

    if status_code.is_success() {
        LinkCheckResult {
            url,
            status: LinkStatus::Ok,
            message: Some(format!("HTTP {}", code)),
        }
    } else if status_code.is_redirection() {
        let target = location.unwrap_or("unknown").to_string();
        LinkCheckResult {
            url,
            message: Some(format!("HTTP {} -> {}", code, target)),
            status: LinkStatus::Redirect(target),
        }
    } else if matches!(status_code, StatusCode::NOT_FOUND | StatusCode::GONE) {
        LinkCheckResult {
            url,
            status: LinkStatus::Broken,
            message: Some(format!("HTTP {}", code)),
        }
    } else {
        LinkCheckResult {
            url,
            status: LinkStatus::Error,
            message: Some(format!("HTTP {}", code)),
        }
    }
}

// Categorizes different error types from reqwest
fn categorize_error(url: String, error: reqwest::Error) -> LinkCheckResult {
    let error_string = error.to_string().to_lowercase();

    let (status, message) = if error.is_timeout() {
        (LinkStatus::Timeout, "Request timed out".to_string())
    } else if error.is_redirect() {
        (LinkStatus::TooManyRedirects, "Too many redirects".to_string())
    } else if error.is_connect() {
        // Connection errors often mean DNS issues or host unreachable
        if error_string.contains("dns") {
            (LinkStatus::DnsError, "Could not resolve hostname".to_string())
        } else {
            (LinkStatus::Error, "Connection failed".to_string())
        }
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        (LinkStatus::SslError, "SSL certificate error".to_string())
    } else {
        (LinkStatus::Error, error.to_string())
    };

    LinkCheckResult {
        url,
        status,
        message: Some(message),
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is StreamExt and buffer_unordered?
//    - StreamExt is a trait (like an interface) that adds methods to streams
//    - buffer_unordered(N) runs up to N futures concurrently
//    - Results arrive in completion order, so we put them back in input
//      order with a HashMap afterwards
//
// 2. Why clone the client?
//    - Each future needs its own handle to the client
//    - Client is cheap to clone (it's just a reference counter internally)
//
// 3. Why DashMap for the cache?
//    - check_links takes &self, so the cache must be writable through a
//      shared reference
//    - DashMap shards its locks; no lock is held across an .await here
// -----------------------------------------------------------------------------
