//! Output module for presenting jobs on the terminal
//!
//! This module handles:
//! - Rendering a page of jobs as a table with pagination totals
//! - Rendering one job's full detail, including its analysis result

use crate::storage::{CrawlJob, JobPage, JobQuery};
use std::fmt::Write;

const URL_WIDTH: usize = 48;

/// Renders a job listing with pagination totals
pub fn render_job_table(page: &JobPage, query: &JobQuery) -> String {
    let mut out = String::new();

    if page.jobs.is_empty() {
        let _ = writeln!(out, "No jobs found.");
    } else {
        let _ = writeln!(
            out,
            "{:<36}  {:<9}  {:<width$}  {}",
            "ID",
            "STATUS",
            "URL",
            "UPDATED",
            width = URL_WIDTH
        );
        for job in &page.jobs {
            let _ = writeln!(
                out,
                "{:<36}  {:<9}  {:<width$}  {}",
                job.id,
                job.status,
                truncate(&job.target_url, URL_WIDTH),
                job.updated_at.format("%Y-%m-%d %H:%M:%S"),
                width = URL_WIDTH
            );
        }
    }

    let limit = u64::from(query.limit());
    let total_pages = page.total.div_ceil(limit).max(1);
    let _ = writeln!(
        out,
        "\nPage {} of {} ({} jobs total)",
        query.page.max(1),
        total_pages,
        page.total
    );

    out
}

/// Renders everything known about one job
pub fn render_job_detail(job: &CrawlJob) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Job {} ===\n", job.id);
    let _ = writeln!(out, "  URL: {}", job.target_url);
    let _ = writeln!(out, "  Owner: {}", job.owner);
    let _ = writeln!(out, "  Status: {}", job.status);
    let _ = writeln!(out, "  Created: {}", job.created_at.to_rfc3339());
    let _ = writeln!(out, "  Updated: {}", job.updated_at.to_rfc3339());

    if let Some(reason) = &job.failure_reason {
        let _ = writeln!(out, "\nFailure: {}", reason);
    }

    if let Some(result) = &job.result {
        let _ = writeln!(out, "\nAnalysis:");
        let _ = writeln!(
            out,
            "  Title: {}",
            result.title.as_deref().unwrap_or("(none)")
        );
        let _ = writeln!(out, "  Markup version: {}", result.markup_version);
        let _ = writeln!(out, "  Login form: {}", if result.has_login_form { "yes" } else { "no" });
        let _ = writeln!(out, "  Internal links: {}", result.internal_link_count);
        let _ = writeln!(out, "  External links: {}", result.external_link_count);
        let _ = writeln!(out, "  Duration: {}ms", result.analysis_duration_ms);

        let _ = writeln!(out, "\nHeadings:");
        for (tag, count) in result.heading_counts.iter() {
            let _ = writeln!(out, "  {}: {}", tag, count);
        }

        if !result.broken_links.is_empty() {
            let _ = writeln!(out, "\nBroken Links ({}):", result.broken_links.len());
            for link in &result.broken_links {
                let _ = writeln!(out, "  - {} [{}] {}", link.url, link.status_code, link.detail);
            }
        }
    }

    out
}

/// Prints a job listing to standard output
pub fn print_job_table(page: &JobPage, query: &JobQuery) {
    print!("{}", render_job_table(page, query));
}

/// Prints one job's detail to standard output
pub fn print_job_detail(job: &CrawlJob) {
    print!("{}", render_job_detail(job));
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
