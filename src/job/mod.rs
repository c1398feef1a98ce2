// src/job/mod.rs
// =============================================================================
// Crawl jobs: the job record, its results, and the store that owns them.
//
// Submodules:
// - model: CrawlJob, its lifecycle and the views handed to readers
// - store: JobStore, which creates, tracks and stops jobs
// =============================================================================

mod model;
mod store;

pub use model::{CrawlJob, JobId, JobResultsView, JobStatus, JobStatusView, PageOutcome};
pub use store::{CrawlRequest, JobError, JobStore};

#[cfg(test)]
pub use model::CrawlResults;
