// src/job/store.rs
// =============================================================================
// The job store: every crawl job, running or finished, keyed by its id.
//
// What it does:
// - create(): validates the request, registers the job, spawns its crawl
//   as a detached task and returns the id right away
// - status() / results() / list(): consistent snapshots for readers
// - stop(): cooperative stop; the crawl notices between pages
// - shutdown(): stops everything still running and waits for it
//
// Concurrency:
// - Jobs live in a DashMap, so readers and crawl tasks never block each
//   other for longer than one field update
// - No map guard is ever held across an .await; all mutation goes through
//   update(), which takes a synchronous closure
// - A supervising task wraps each crawl; a crawl that errors or panics
//   moves its job to `error` instead of vanishing
// =============================================================================

use dashmap::DashMap;
use futures::FutureExt; // catch_unwind() on futures
use serde::Deserialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use super::model::{CrawlJob, JobId, JobResultsView, JobStatus, JobStatusView};
use crate::checker::{LinkChecker, LinkProbe};
use crate::config::Settings;
use crate::crawl::{self, CrawlContext, CrawlPlan};
use crate::render::RenderingEngine;

/// Errors surfaced to whoever is asking about jobs
#[derive(Debug, Error)]
pub enum JobError {
    #[error("url is required")]
    MissingUrl,

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("job {0} not found")]
    NotFound(JobId),
}

/// A request to start a crawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    pub url: Option<String>,
    pub max_pages: Option<usize>,
    pub max_depth: Option<usize>,
}

impl CrawlRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }
}

struct JobEntry {
    job: CrawlJob,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct StoreInner {
    jobs: DashMap<JobId, JobEntry>,
    engine: Arc<dyn RenderingEngine>,
    settings: Settings,
}

/// Handle to the job registry; clones share the same jobs
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<StoreInner>,
}

impl JobStore {
    pub fn new(engine: Arc<dyn RenderingEngine>, settings: Settings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                jobs: DashMap::new(),
                engine,
                settings,
            }),
        }
    }

    /// Registers a new job and starts crawling in the background
    ///
    /// Returns as soon as the job exists; the crawl itself runs detached.
    /// Must be called from inside a tokio runtime.
    pub fn create(&self, request: CrawlRequest) -> Result<JobId, JobError> {
        let start_url = parse_start_url(request.url.as_deref())?;
        let settings = &self.inner.settings;
        let max_pages = request
            .max_pages
            .unwrap_or(settings.default_max_pages)
            .max(1);
        let max_depth = request.max_depth.unwrap_or(settings.default_max_depth);

        let id = Uuid::new_v4();
        let cancel = self.register(CrawlJob::new(id, start_url.to_string(), max_pages, max_depth));

        info!(job = %id, url = %start_url, max_pages, max_depth, "crawl job created");

        let plan = CrawlPlan {
            start_url,
            max_pages,
            max_depth,
        };
        let task = tokio::spawn(self.clone().supervise(id, plan, cancel));

        if let Some(mut entry) = self.inner.jobs.get_mut(&id) {
            entry.task = Some(task);
        }

        Ok(id)
    }

    /// Current state, progress and timing of a job
    pub fn status(&self, id: JobId) -> Result<JobStatusView, JobError> {
        self.inner
            .jobs
            .get(&id)
            .map(|entry| JobStatusView::from(&entry.job))
            .ok_or(JobError::NotFound(id))
    }

    /// Everything found so far, plus counts per category
    pub fn results(&self, id: JobId) -> Result<JobResultsView, JobError> {
        self.inner
            .jobs
            .get(&id)
            .map(|entry| JobResultsView::from(&entry.job))
            .ok_or(JobError::NotFound(id))
    }

    /// Status of every job, newest first
    pub fn list(&self) -> Vec<JobStatusView> {
        let mut jobs: Vec<JobStatusView> = self
            .inner
            .jobs
            .iter()
            .map(|entry| JobStatusView::from(&entry.job))
            .collect();
        jobs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        jobs
    }

    /// Asks a running job to stop
    ///
    /// Returns the job's status afterwards. A job that already ended keeps
    /// its terminal status.
    pub fn stop(&self, id: JobId) -> Result<JobStatus, JobError> {
        let mut entry = self.inner.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        if entry.job.finish(JobStatus::Stopped, None) {
            entry.cancel.cancel();
            info!(job = %id, pages = entry.job.pages_scanned, "crawl job stopped");
        }
        Ok(entry.job.status)
    }

    /// Stops every running job and waits for their tasks to wind down
    pub async fn shutdown(&self) {
        let mut tasks = Vec::new();
        for mut entry in self.inner.jobs.iter_mut() {
            if entry.job.finish(JobStatus::Stopped, None) {
                entry.cancel.cancel();
            }
            if let Some(task) = entry.task.take() {
                tasks.push(task);
            }
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "crawl task did not shut down cleanly");
            }
        }
    }

    // Inserts a job with no task attached yet; returns its stop token
    pub(crate) fn register(&self, job: CrawlJob) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.inner.jobs.insert(
            job.id,
            JobEntry {
                job,
                cancel: cancel.clone(),
                task: None,
            },
        );
        cancel
    }

    /// Applies `f` to a job in place; None when the job does not exist
    pub(crate) fn update<R>(&self, id: JobId, f: impl FnOnce(&mut CrawlJob) -> R) -> Option<R> {
        self.inner.jobs.get_mut(&id).map(|mut entry| f(&mut entry.job))
    }

    // Runs one crawl and turns whatever escapes it into the job's final state
    async fn supervise(self, id: JobId, plan: CrawlPlan, cancel: CancellationToken) {
        let settings = &self.inner.settings;

        let probe: Option<Arc<dyn LinkProbe>> = if settings.check_links {
            match LinkChecker::new(
                &settings.user_agent,
                settings.link_check_timeout,
                settings.link_check_concurrency,
            ) {
                Ok(checker) => Some(Arc::new(checker)),
                Err(e) => {
                    self.fail(id, format!("failed to build link checker: {}", e));
                    return;
                }
            }
        } else {
            None
        };

        let ctx = CrawlContext {
            store: self.clone(),
            job_id: id,
            engine: Arc::clone(&self.inner.engine),
            probe,
            settings: settings.clone(),
            cancel,
        };

        let outcome = AssertUnwindSafe(crawl::run_crawl(&ctx, &plan))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.fail(id, e.to_string()),
            Err(panic) => self.fail(id, format!("crawl panicked: {}", panic_message(panic.as_ref()))),
        }
    }

    fn fail(&self, id: JobId, message: String) {
        error!(job = %id, error = %message, "crawl job failed");
        self.update(id, |job| job.finish(JobStatus::Error, Some(message)));
    }
}

// Only http(s) URLs with a host can be crawled
fn parse_start_url(raw: Option<&str>) -> Result<Url, JobError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(JobError::MissingUrl)?;

    let invalid = |reason: String| JobError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    url.set_fragment(None);
    Ok(url)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fake::{FakeEngine, FakePage, FakeSite};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn test_settings() -> Settings {
        Settings {
            check_links: false,
            ..Settings::default()
        }
    }

    fn store_with(engine: FakeEngine) -> JobStore {
        JobStore::new(Arc::new(engine), test_settings())
    }

    async fn wait_until_done(store: &JobStore, id: JobId) -> JobStatusView {
        for _ in 0..1000 {
            let status = store.status(id).unwrap();
            if status.status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", id);
    }

    #[test]
    fn test_parse_start_url() {
        assert!(matches!(parse_start_url(None), Err(JobError::MissingUrl)));
        assert!(matches!(parse_start_url(Some("  ")), Err(JobError::MissingUrl)));
        assert!(matches!(
            parse_start_url(Some("not a url")),
            Err(JobError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_start_url(Some("ftp://example.test/")),
            Err(JobError::InvalidUrl { .. })
        ));
        assert_eq!(
            parse_start_url(Some(" https://example.test/#top ")).unwrap().as_str(),
            "https://example.test/"
        );
    }

    #[tokio::test]
    async fn test_create_rejects_bad_url_without_creating_job() {
        let store = store_with(FakeEngine::new(FakeSite::new()));
        let err = store.create(CrawlRequest::new("example dot test")).unwrap_err();
        assert!(matches!(err, JobError::InvalidUrl { .. }));
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = store_with(FakeEngine::new(FakeSite::new()));
        let id = Uuid::new_v4();
        assert!(matches!(store.status(id), Err(JobError::NotFound(_))));
        assert!(matches!(store.results(id), Err(JobError::NotFound(_))));
        assert!(matches!(store.stop(id), Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let site = FakeSite::new()
            .page(
                "https://example.test/",
                FakePage::html(r#"<title>Home</title><a href="/about">About</a>"#),
            )
            .page("https://example.test/about", FakePage::html("<title>About</title>"));
        let store = store_with(FakeEngine::new(site));

        let id = store
            .create(CrawlRequest {
                url: Some("https://example.test/".to_string()),
                max_pages: Some(5),
                max_depth: Some(1),
            })
            .unwrap();

        let status = wait_until_done(&store, id).await;
        assert_eq!(status.status, JobStatus::Complete);
        assert_eq!(status.pages_scanned, 2);
        assert_eq!(status.max_pages, 5);

        let results = store.results(id).unwrap();
        assert_eq!(results.summary.pages, 2);
        assert_eq!(store.list().len(), 1);
    }

    #[tokio::test]
    async fn test_defaults_applied_from_settings() {
        let store = store_with(FakeEngine::new(FakeSite::new()));
        let id = store.create(CrawlRequest::new("https://example.test/")).unwrap();
        let status = store.status(id).unwrap();
        assert_eq!(status.max_pages, 50);
        assert_eq!(status.max_depth, 3);
        wait_until_done(&store, id).await;
    }

    #[tokio::test]
    async fn test_engine_launch_failure_marks_job_error() {
        let engine = FakeEngine::broken("chrome not found");
        let store = store_with(engine);

        let id = store.create(CrawlRequest::new("https://example.test/")).unwrap();
        let status = wait_until_done(&store, id).await;

        assert_eq!(status.status, JobStatus::Error);
        assert!(status.error.unwrap().contains("chrome not found"));
    }

    #[tokio::test]
    async fn test_stop_after_completion_has_no_effect() {
        let store = store_with(FakeEngine::new(FakeSite::new()));
        let id = store.create(CrawlRequest::new("https://example.test/")).unwrap();
        wait_until_done(&store, id).await;

        assert_eq!(store.stop(id).unwrap(), JobStatus::Complete);
        assert_eq!(store.status(id).unwrap().status, JobStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_results_and_halts_crawl() {
        let slow = Duration::from_secs(1);
        let site = FakeSite::new()
            .page(
                "https://example.test/",
                FakePage::html(r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>"#),
            )
            .page("https://example.test/a", FakePage::html("a").delay(slow))
            .page("https://example.test/b", FakePage::html("b").delay(slow))
            .page("https://example.test/c", FakePage::html("c").delay(slow));
        let engine = FakeEngine::new(site);
        let stats = Arc::clone(&engine.stats);
        let store = store_with(engine);

        let id = store.create(CrawlRequest::new("https://example.test/")).unwrap();

        // Let the seed and part of /a go through, then stop
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.stop(id).unwrap(), JobStatus::Stopped);
        let pages_at_stop = store.results(id).unwrap().results.pages.len();

        let status = wait_until_done(&store, id).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(status.status, JobStatus::Stopped);
        let results = store.results(id).unwrap();
        assert_eq!(results.results.pages.len(), pages_at_stop);
        assert_eq!(results.results.pages[0].url, "https://example.test/");
        assert!(stats.navigated().len() < 4);
        assert_eq!(stats.browsers_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_running_jobs() {
        let site = FakeSite::new().page(
            "https://example.test/",
            FakePage::html("home").delay(Duration::from_millis(50)),
        );
        let store = store_with(FakeEngine::new(site));
        let id = store.create(CrawlRequest::new("https://example.test/")).unwrap();

        store.shutdown().await;

        let status = store.status(id).unwrap();
        assert!(status.status.is_terminal());
    }
}
