// src/crawl/queue.rs
// =============================================================================
// The crawl frontier: a FIFO queue of pages to visit plus the visited set.
//
// How it works:
// 1. Start with the seed URL in the queue at depth 0
// 2. Pop the front of the queue (FIFO = breadth-first)
// 3. Skip it if it was already visited or is deeper than allowed
// 4. Otherwise mark it visited and hand it to the analyzer
// 5. Push the page's same-host links to the back at depth + 1
//
// A link is only checked against the visited set when it is queued, not
// against the queue itself, so the same URL may sit in the queue more than
// once. The duplicates are dropped when they reach the front (step 3).
//
// Rust concepts:
// - HashSet: To track visited URLs (O(1) lookup)
// - VecDeque: Double-ended queue for breadth-first crawling
// - Url: For resolving links and comparing hosts
// =============================================================================

use std::collections::{HashSet, VecDeque};
use url::Url;

use crate::analyzer::resolve_link;

// Represents a page in the crawl queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlItem {
    pub url: String,
    pub depth: usize, // How many link hops from the seed
}

#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<CrawlItem>,
    visited: HashSet<String>,
    // Only pages on this host are ever queued
    host: Option<String>,
}

impl Frontier {
    /// A frontier holding just the seed, at depth 0
    pub fn new(start: &Url) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(CrawlItem {
            url: start.to_string(),
            depth: 0,
        });

        Self {
            queue,
            visited: HashSet::new(),
            host: start.host_str().map(str::to_string),
        }
    }

    /// Takes the next item off the front of the queue
    pub fn pop(&mut self) -> Option<CrawlItem> {
        self.queue.pop_front()
    }

    /// Marks `item` visited if it is new and within `max_depth`
    ///
    /// Returns false for items that must be skipped.
    pub fn admit(&mut self, item: &CrawlItem, max_depth: usize) -> bool {
        if item.depth > max_depth || self.visited.contains(&item.url) {
            return false;
        }
        self.visited.insert(item.url.clone());
        true
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Number of entries waiting, duplicates included
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Queues the same-host links found on `page_url` at `depth + 1`
    ///
    /// `page_url` is the URL of the document the links came from, which
    /// after a redirect is not the URL that was requested.
    ///
    /// Links that do not resolve, are not http(s), point to another host or
    /// were already visited are dropped. Returns how many were queued.
    pub fn enqueue_links(&mut self, page_url: &str, depth: usize, links: &[String]) -> usize {
        // Parse the page URL for resolving relative links
        let base = match Url::parse(page_url) {
            Ok(url) => url,
            Err(_) => return 0,
        };

        let mut queued = 0;
        for link in links {
            let resolved = match resolve_link(&base, link) {
                Some(url) => url,
                None => continue,
            };
            if resolved.host_str() != self.host.as_deref() {
                continue;
            }

            let url = resolved.to_string();
            if !self.visited.contains(&url) {
                self.queue.push_back(CrawlItem {
                    url,
                    depth: depth + 1,
                });
                queued += 1;
            }
        }
        queued
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is VecDeque?
//    - A double-ended queue (deck)
//    - push_back() adds to end, pop_front() removes from start
//    - Perfect for breadth-first search (BFS)
//
// 2. Breadth-first vs depth-first:
//    - Breadth-first: Crawl all pages at depth 1, then depth 2, etc.
//    - Depth-first: Follow one path all the way down, then backtrack
//    - With a FIFO queue, pages come out in non-decreasing depth order
//
// 3. What does .host_str() return?
//    - Option<&str> with the host: Some("example.com") for
//      http://example.com/path, also works for IP addresses
//    - None for URLs without a host (like data: URLs)
// -----------------------------------------------------------------------------
