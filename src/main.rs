// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Load .env (if any), set up logging and read settings
// 2. Parse command-line arguments using clap
// 3. Dispatch to the appropriate subcommand handler
// 4. Exit with proper code (0 = clean, 1 = broken things found, 2 = error)
//
// Logs go to stderr so `--json` output on stdout stays machine-readable.
// =============================================================================

// Module declarations - tells Rust about our other source files
mod analyzer; // src/analyzer/ - per-page checks
mod api; // src/api/ - HTTP API over the job store
mod checker; // src/checker/ - link reachability probing
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - runtime settings
mod crawl; // src/crawl/ - breadth-first crawl of one job
mod findings; // src/findings.rs - finding records
mod job; // src/job/ - job records and the job store
mod render; // src/render/ - page rendering engines

use anyhow::{Context, Result};
use clap::Parser; // Parser trait enables the parse() method
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};
use config::Settings;
use job::{CrawlRequest, JobId, JobResultsView, JobStatus, JobStore};
use render::HttpEngine;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "site_auditor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// Returns:
//   Ok(0) = nothing broken found
//   Ok(1) = broken links, script errors or missing images found
//   Ok(2) = the crawl itself failed
//   Err = unexpected error
async fn run() -> Result<i32> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();

    match cli.command {
        Commands::Crawl {
            url,
            max_pages,
            max_depth,
            json,
            no_link_check,
        } => {
            if no_link_check {
                settings.check_links = false;
            }
            let request = CrawlRequest {
                url: Some(url),
                max_pages,
                max_depth,
            };
            handle_crawl(settings, request, json).await
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.bind_addr = bind;
            }
            handle_serve(settings).await
        }
    }
}

// Handles the 'crawl' subcommand: one job, run in this process
async fn handle_crawl(settings: Settings, request: CrawlRequest, json: bool) -> Result<i32> {
    let store = JobStore::new(Arc::new(HttpEngine::new()), settings);
    let id = store.create(request)?;

    let status = store.status(id)?;
    if !json {
        println!("🔍 Crawling website: {}", status.start_url);
        println!(
            "📊 Max pages: {}, max depth: {}",
            status.max_pages, status.max_depth
        );
    }

    watch_job(&store, id, json).await?;

    // Let the crawl task release its browser before reporting
    store.shutdown().await;

    let report = store.results(id)?;
    print_results(&report, json)?;
    Ok(exit_code(&report))
}

// Polls the job until it ends, printing progress; Ctrl-C stops the crawl
async fn watch_job(store: &JobStore, id: JobId, quiet: bool) -> Result<()> {
    let mut last_scanned = 0;
    let mut stopping = false;
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());

    loop {
        let status = store.status(id)?;

        if !quiet && status.pages_scanned != last_scanned {
            last_scanned = status.pages_scanned;
            if let Some(current) = &status.current_url {
                println!("   [{}/{}] {}", last_scanned, status.max_pages, current);
            }
        }
        if status.status.is_terminal() {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(PROGRESS_INTERVAL) => {}
            signal = &mut ctrl_c, if !stopping => {
                signal.context("failed to listen for Ctrl-C")?;
                stopping = true;
                if !quiet {
                    println!("\n⏹️  Stopping crawl...");
                }
                store.stop(id)?;
            }
        }
    }
}

// Handles the 'serve' subcommand
async fn handle_serve(settings: Settings) -> Result<i32> {
    let addr = settings.bind_addr.clone();
    let store = JobStore::new(Arc::new(HttpEngine::new()), settings);
    let app = api::create_router(store.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutting down, stopping running crawls");
    store.shutdown().await;
    Ok(0)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, shut down by other means");
        std::future::pending::<()>().await;
    }
}

// 2 for a failed job, 1 when anything "broken" was found, otherwise 0
fn exit_code(report: &JobResultsView) -> i32 {
    if report.status == JobStatus::Error {
        return 2;
    }
    let summary = &report.summary;
    if summary.broken_links + summary.js_errors + summary.missing_images > 0 {
        1
    } else {
        0
    }
}

// Prints the results either as a report or JSON
fn print_results(report: &JobResultsView, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print_report(report);
    }
    Ok(())
}

// Shortens long text for table columns without splitting a character
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

// Prints results as a human-readable report in the terminal
fn print_report(report: &JobResultsView) {
    let results = &report.results;
    println!();

    println!("{:<60} {:<7} {:<8} {:<30}", "PAGE", "STATUS", "LOAD", "TITLE / ERROR");
    println!("{}", "=".repeat(105));
    for page in &results.pages {
        let (status, load, detail) = match &page.outcome {
            job::PageOutcome::Loaded {
                title,
                load_time,
                status_code,
            } => (status_code.to_string(), format!("{}ms", load_time), title.clone()),
            job::PageOutcome::Failed { error } => {
                ("-".to_string(), "-".to_string(), error.clone())
            }
        };
        println!(
            "{:<60} {:<7} {:<8} {:<30}",
            truncate(&page.url, 60),
            status,
            load,
            truncate(&detail, 60)
        );
    }

    if !results.broken_links.is_empty() {
        println!("\n❌ Broken links:");
        for item in &results.broken_links {
            let link = &item.finding;
            let message = link.message.as_deref().unwrap_or("");
            println!("   {} [{}] {} (on {})", link.url, link.status, message, item.found_on);
        }
    }
    if !results.js_errors.is_empty() {
        println!("\n💥 JavaScript errors:");
        for item in &results.js_errors {
            println!("   {} (on {})", truncate(&item.finding.message, 100), item.found_on);
        }
    }
    if !results.missing_images.is_empty() {
        println!("\n🖼️  Missing images:");
        for item in &results.missing_images {
            let image = &item.finding;
            println!("   {} [{}] (on {})", image.src, image.alt, item.found_on);
        }
    }
    if !results.console_logs.is_empty() {
        println!("\n📝 Console errors and warnings:");
        for item in &results.console_logs {
            let log = &item.finding;
            println!(
                "   {}: {} (on {})",
                log.level,
                truncate(&log.text, 100),
                item.found_on
            );
        }
    }
    if !results.dead_buttons.is_empty() {
        println!("\n🔘 Dead buttons and links:");
        for item in &results.dead_buttons {
            let dead = &item.finding;
            println!("   {} \"{}\" (on {})", dead.element, dead.text, item.found_on);
        }
    }
    if !results.slow_pages.is_empty() {
        println!("\n🐢 Slow pages:");
        for slow in &results.slow_pages {
            println!("   {} ({}ms)", slow.url, slow.load_time);
        }
    }
    if !results.missing_alt.is_empty() {
        println!("\n🏷️  Images without alt text:");
        for item in &results.missing_alt {
            println!("   {} (on {})", item.finding.src, item.found_on);
        }
    }
    if !results.form_issues.is_empty() {
        println!("\n📋 Form issues:");
        for item in &results.form_issues {
            let issue = &item.finding;
            println!("   {}: {} (on {})", issue.form, issue.issue, item.found_on);
        }
    }

    let summary = &report.summary;
    println!();
    println!("📊 Summary ({}):", status_label(report.status));
    println!("   📄 Pages: {}", summary.pages);
    println!("   ❌ Broken links: {}", summary.broken_links);
    println!("   💥 JavaScript errors: {}", summary.js_errors);
    println!("   🖼️  Missing images: {}", summary.missing_images);
    println!("   📝 Console messages: {}", summary.console_logs);
    println!("   🔘 Dead buttons: {}", summary.dead_buttons);
    println!("   🐢 Slow pages: {}", summary.slow_pages);
    println!("   🏷️  Missing alt: {}", summary.missing_alt);
    println!("   📋 Form issues: {}", summary.form_issues);
    println!("   📋 Total issues: {}", summary.total_issues);
    if let Some(error) = &report.error {
        println!("   ⚠️  Crawl failed: {}", error);
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Running => "⏳ running",
        JobStatus::Stopped => "⏹️  stopped",
        JobStatus::Complete => "✅ complete",
        JobStatus::Error => "⚠️  error",
    }
}
