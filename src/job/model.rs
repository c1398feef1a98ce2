// src/job/model.rs
// =============================================================================
// The crawl job record and its aggregate results.
//
// A job is created in the `running` state and ends in exactly one of
// `stopped`, `complete` or `error`. Once it has left `running` nothing can
// move it again, and nothing is appended to its results.
//
// While the job runs, every result collection only ever grows, so a status
// or results snapshot taken at any moment is a consistent prefix of the
// final report.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::analyzer::{PageAnalysis, PageFindings};
use crate::findings::{
    BrokenLink, ConsoleLog, DeadButton, FormIssue, Found, JsError, MissingAlt, MissingImage,
    SlowPage,
};

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Stopped,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// One visited page: either its load details or the error that stopped it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub url: String,
    pub depth: usize,
    #[serde(flatten)]
    pub outcome: PageOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PageOutcome {
    #[serde(rename_all = "camelCase")]
    Loaded {
        title: String,
        /// Milliseconds
        load_time: u64,
        status_code: u16,
    },
    Failed { error: String },
}

impl PageRecord {
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            PageOutcome::Failed { error } => Some(error),
            PageOutcome::Loaded { .. } => None,
        }
    }
}

/// Everything a crawl has found so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResults {
    pub pages: Vec<PageRecord>,
    pub broken_links: Vec<Found<BrokenLink>>,
    pub js_errors: Vec<Found<JsError>>,
    pub missing_images: Vec<Found<MissingImage>>,
    pub console_logs: Vec<Found<ConsoleLog>>,
    pub dead_buttons: Vec<Found<DeadButton>>,
    pub slow_pages: Vec<SlowPage>,
    pub missing_alt: Vec<Found<MissingAlt>>,
    pub form_issues: Vec<Found<FormIssue>>,
}

/// Counts per finding category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub pages: usize,
    pub broken_links: usize,
    pub js_errors: usize,
    pub missing_images: usize,
    pub console_logs: usize,
    pub dead_buttons: usize,
    pub slow_pages: usize,
    pub missing_alt: usize,
    pub form_issues: usize,
    pub total_issues: usize,
}

impl CrawlResults {
    pub fn summary(&self) -> ResultSummary {
        let mut summary = ResultSummary {
            pages: self.pages.len(),
            broken_links: self.broken_links.len(),
            js_errors: self.js_errors.len(),
            missing_images: self.missing_images.len(),
            console_logs: self.console_logs.len(),
            dead_buttons: self.dead_buttons.len(),
            slow_pages: self.slow_pages.len(),
            missing_alt: self.missing_alt.len(),
            form_issues: self.form_issues.len(),
            total_issues: 0,
        };
        summary.total_issues = summary.broken_links
            + summary.js_errors
            + summary.missing_images
            + summary.console_logs
            + summary.dead_buttons
            + summary.slow_pages
            + summary.missing_alt
            + summary.form_issues;
        summary
    }

    // Appends every non-empty collection, stamping each finding with the page
    fn merge(&mut self, page_url: &str, findings: PageFindings) {
        fn stamp<T>(into: &mut Vec<Found<T>>, page_url: &str, items: Vec<T>) {
            into.extend(items.into_iter().map(|item| Found::on(page_url, item)));
        }

        stamp(&mut self.broken_links, page_url, findings.broken_links);
        stamp(&mut self.js_errors, page_url, findings.js_errors);
        stamp(&mut self.missing_images, page_url, findings.missing_images);
        stamp(&mut self.console_logs, page_url, findings.console_logs);
        stamp(&mut self.dead_buttons, page_url, findings.dead_buttons);
        stamp(&mut self.missing_alt, page_url, findings.missing_alt);
        stamp(&mut self.form_issues, page_url, findings.form_issues);
    }
}

/// One crawl run
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub id: JobId,
    pub status: JobStatus,
    pub start_url: String,
    pub start_time: DateTime<Utc>,
    pub max_pages: usize,
    pub max_depth: usize,
    pub pages_scanned: usize,
    pub current_url: Option<String>,
    pub results: CrawlResults,
    pub error: Option<String>,
    started: Instant,
    finished: Option<Instant>,
}

impl CrawlJob {
    pub fn new(id: JobId, start_url: String, max_pages: usize, max_depth: usize) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            start_url,
            start_time: Utc::now(),
            max_pages,
            max_depth,
            pages_scanned: 0,
            current_url: None,
            results: CrawlResults::default(),
            error: None,
            started: Instant::now(),
            finished: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Wall-clock time since creation, frozen once the job ends
    pub fn elapsed(&self) -> Duration {
        self.finished
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started)
    }

    /// Moves a running job to a terminal state
    ///
    /// Returns false, changing nothing, when the job already ended.
    pub fn finish(&mut self, status: JobStatus, error: Option<String>) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = if status == JobStatus::Error { error } else { None };
        self.finished = Some(Instant::now());
        true
    }

    /// Marks `url` as the page being analyzed
    pub fn begin_page(&mut self, url: &str, pages_scanned: usize) {
        self.current_url = Some(url.to_string());
        self.pages_scanned = pages_scanned;
    }

    /// Records a successfully analyzed page and all of its findings
    ///
    /// Adds a SlowPage entry when the load took longer than `slow_threshold`.
    pub fn record_page(
        &mut self,
        url: &str,
        depth: usize,
        analysis: PageAnalysis,
        slow_threshold: Duration,
    ) {
        let load_time = analysis.load_time.as_millis() as u64;

        self.results.pages.push(PageRecord {
            url: url.to_string(),
            depth,
            outcome: PageOutcome::Loaded {
                title: analysis.title,
                load_time,
                status_code: analysis.status_code,
            },
        });
        self.results.merge(url, analysis.findings);

        // Compared in whole milliseconds, the unit the finding reports
        if load_time > slow_threshold.as_millis() as u64 {
            self.results.slow_pages.push(SlowPage {
                url: url.to_string(),
                load_time,
            });
        }
    }

    /// Records a page that could not be analyzed
    pub fn record_failure(&mut self, url: &str, depth: usize, error: JsError) {
        self.results.pages.push(PageRecord {
            url: url.to_string(),
            depth,
            outcome: PageOutcome::Failed {
                error: error.message.clone(),
            },
        });
        self.results.js_errors.push(Found::on(url, error));
    }
}

/// What a status query returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub id: JobId,
    pub status: JobStatus,
    pub start_url: String,
    pub start_time: DateTime<Utc>,
    pub max_pages: usize,
    pub max_depth: usize,
    pub pages_scanned: usize,
    /// Whole seconds
    pub elapsed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&CrawlJob> for JobStatusView {
    fn from(job: &CrawlJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            start_url: job.start_url.clone(),
            start_time: job.start_time,
            max_pages: job.max_pages,
            max_depth: job.max_depth,
            pages_scanned: job.pages_scanned,
            elapsed: job.elapsed().as_secs(),
            current_url: job.current_url.clone(),
            error: job.error.clone(),
        }
    }
}

/// What a results query returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultsView {
    pub id: JobId,
    pub status: JobStatus,
    pub pages_scanned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: CrawlResults,
    pub summary: ResultSummary,
}

impl From<&CrawlJob> for JobResultsView {
    fn from(job: &CrawlJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            pages_scanned: job.pages_scanned,
            error: job.error.clone(),
            results: job.results.clone(),
            summary: job.results.summary(),
        }
    }
}
