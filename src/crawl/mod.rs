// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - Breadth-first crawling starting from a URL
// - Same-host restriction (never leaves the start URL's host)
// - Page and depth limits
// - Cooperative stop between pages
//
// Submodules:
// - queue: The frontier (what to visit next, what was already visited)
// - orchestrator: Drives one job's crawl from browser launch to completion
//
// Rust concepts:
// - Async programming: Every page is awaited in turn, one tab at a time
// - Collections: HashSet for tracking visited URLs, VecDeque for queue
// =============================================================================

mod orchestrator;
mod queue;

pub use orchestrator::{run_crawl, CrawlContext, CrawlPlan};
