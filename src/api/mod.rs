// src/api/mod.rs
// =============================================================================
// HTTP API over the job store.
//
// Routes:
// - POST /api/crawl               start a crawl, answers 202 with { jobId }
// - GET  /api/crawl/{id}/status   progress snapshot
// - GET  /api/crawl/{id}/results  findings so far, plus a summary
// - POST /api/crawl/{id}/stop     cooperative stop
// - GET  /api/crawls              every job, newest first
// - GET  /health                  liveness
//
// Handlers never wait on a crawl; they only read or flip job state.
// =============================================================================

mod crawl;
mod error;
mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::job::JobStore;

/// Builds the router with every endpoint and request tracing
pub fn create_router(store: JobStore) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/crawl", post(crawl::start_crawl))
        .route("/api/crawl/{id}/status", get(crawl::crawl_status))
        .route("/api/crawl/{id}/results", get(crawl::crawl_results))
        .route("/api/crawl/{id}/stop", post(crawl::stop_crawl))
        .route("/api/crawls", get(crawl::list_crawls))
        .with_state(store)
        .layer(TraceLayer::new_for_http())
}
