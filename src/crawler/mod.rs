//! Crawler module for single-page analysis jobs
//!
//! This module contains the core analysis logic, including:
//! - HTTP fetching of the submitted page
//! - HTML analysis (title, markup version, headings, links, login forms)
//! - Concurrent link verification
//! - Job lifecycle coordination

mod analyzer;
mod coordinator;
mod fetcher;
mod result;
mod verifier;

pub use analyzer::{analyze_page, PageAnalysis, DEFAULT_MARKUP_VERSION, XHTML_MARKUP_VERSION};
pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, fetch_page, user_agent_string, FetchedPage};
pub use result::{BrokenLinkEntry, CrawlResult, HeadingCounts, HEADING_TAGS};
pub use verifier::{probe_link, LinkVerifier};
