// src/crawl/orchestrator.rs
// =============================================================================
// Drives one crawl job from start to finish.
//
// How it works:
// 1. Launch one browser for the whole job
// 2. Loop over the frontier, one page at a time:
//    - stop if the job was stopped or the page limit is reached
//    - open a fresh tab, analyze the page, record what was found
//    - queue the page's same-host links while depth allows
// 3. Mark the job complete (a no-op if it was stopped meanwhile)
// 4. Close the browser, whatever happened above
//
// Everything the crawl learns goes into the job store through short,
// synchronous updates. A page whose analysis finishes after the job was
// stopped is dropped instead of recorded.
// =============================================================================

use futures::FutureExt; // catch_unwind() on futures
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::queue::Frontier;
use crate::analyzer::{self, AnalyzerSettings, PageFailure};
use crate::checker::LinkProbe;
use crate::config::Settings;
use crate::job::{CrawlJob, JobId, JobStatus, JobStore};
use crate::render::{Browser, LaunchOptions, RenderError, RenderingEngine};

/// What to crawl
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    pub start_url: Url,
    pub max_pages: usize,
    pub max_depth: usize,
}

/// Everything a running crawl needs from the outside world
pub struct CrawlContext {
    pub store: JobStore,
    pub job_id: JobId,
    pub engine: Arc<dyn RenderingEngine>,
    pub probe: Option<Arc<dyn LinkProbe>>,
    pub settings: Settings,
    pub cancel: CancellationToken,
}

impl CrawlContext {
    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .store
                .update(self.job_id, |job| job.is_running())
                .unwrap_or(false)
    }

    // Applies `f` only while the job is still running; false once it ended
    fn record(&self, f: impl FnOnce(&mut CrawlJob)) -> bool {
        self.store
            .update(self.job_id, |job| {
                if job.is_running() {
                    f(job);
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false)
    }
}

/// Crawls `plan` on behalf of the job in `ctx`
///
/// Only a browser launch failure is returned as an error; every page-level
/// problem ends up in the job's results instead.
pub async fn run_crawl(ctx: &CrawlContext, plan: &CrawlPlan) -> Result<(), RenderError> {
    let options = LaunchOptions {
        sandbox: ctx.settings.sandbox,
        user_agent: ctx.settings.user_agent.clone(),
    };
    let browser = ctx.engine.launch(&options).await?;
    info!(job = %ctx.job_id, url = %plan.start_url, "browser launched, crawl started");

    // The browser is closed even if the crawl loop panics
    let outcome = AssertUnwindSafe(crawl_pages(ctx, plan, browser.as_ref()))
        .catch_unwind()
        .await;

    if let Err(e) = browser.close().await {
        warn!(job = %ctx.job_id, error = %e, "failed to close browser");
    }

    if let Err(panic) = outcome {
        std::panic::resume_unwind(panic);
    }
    Ok(())
}

async fn crawl_pages(ctx: &CrawlContext, plan: &CrawlPlan, browser: &dyn Browser) {
    let analyzer_settings = AnalyzerSettings::from(&ctx.settings);
    let slow_threshold = ctx.settings.slow_page_threshold;
    let mut frontier = Frontier::new(&plan.start_url);

    while ctx.is_running() && frontier.visited_count() < plan.max_pages {
        let item = match frontier.pop() {
            Some(item) => item,
            None => break,
        };
        if !frontier.admit(&item, plan.max_depth) {
            continue;
        }

        let scanned = frontier.visited_count();
        ctx.store
            .update(ctx.job_id, |job| job.begin_page(&item.url, scanned));
        debug!(
            job = %ctx.job_id,
            url = %item.url,
            depth = item.depth,
            queued = frontier.queued(),
            "visiting page"
        );

        let outcome = match browser.new_session().await {
            Ok(session) => {
                analyzer::analyze(
                    session,
                    &item.url,
                    &analyzer_settings,
                    ctx.probe.as_deref(),
                )
                .await
            }
            Err(e) => Err(PageFailure::from_render(e)),
        };

        match outcome {
            Ok(mut analysis) => {
                let links = std::mem::take(&mut analysis.links);
                // Links resolve against the document actually loaded
                let base = std::mem::take(&mut analysis.page_url);
                let recorded = ctx.record(|job| {
                    job.record_page(&item.url, item.depth, analysis, slow_threshold)
                });
                if !recorded {
                    break;
                }
                if item.depth < plan.max_depth {
                    frontier.enqueue_links(&base, item.depth, &links);
                }
            }
            Err(failure) => {
                warn!(job = %ctx.job_id, url = %item.url, error = %failure, "page failed");
                if !ctx.record(|job| job.record_failure(&item.url, item.depth, failure.error)) {
                    break;
                }
            }
        }
    }

    let completed = ctx
        .store
        .update(ctx.job_id, |job| job.finish(JobStatus::Complete, None))
        .unwrap_or(false);
    if completed {
        info!(
            job = %ctx.job_id,
            pages = frontier.visited_count(),
            "crawl complete"
        );
    }
}
