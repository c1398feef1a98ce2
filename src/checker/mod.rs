// src/checker/mod.rs
// =============================================================================
// This module contains link reachability checking.
//
// Submodules:
// - http: Makes HTTP requests to check if links are alive
//
// The analyzer does not depend on HTTP directly. It asks a LinkProbe, which
// lets tests swap in a scripted probe and lets a crawl run without probing
// at all.
// =============================================================================

mod http;

use async_trait::async_trait;

pub use http::{LinkCheckResult, LinkChecker};

#[cfg(test)]
pub use http::LinkStatus;

/// Something that can tell whether links are reachable
#[async_trait]
pub trait LinkProbe: Send + Sync {
    /// Checks every URL, returning one result per input in input order
    async fn check(&self, urls: Vec<String>) -> Vec<LinkCheckResult>;
}
