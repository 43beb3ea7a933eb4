//! HTML analyzer for extracting page structure
//!
//! This module walks a parsed document once, in document order, and extracts:
//! - Page title
//! - Markup version heuristic
//! - Heading counts (h1-h6)
//! - Internal/external link counts and the links to probe
//! - Login form presence

use crate::crawler::result::{CrawlResult, HeadingCounts};
use crate::url::{classify_link, probe_target, resolve_href, LinkScope};
use scraper::{ElementRef, Html, Node};
use std::collections::HashSet;
use url::Url;

/// Markup version reported when nothing more specific is detected
pub const DEFAULT_MARKUP_VERSION: &str = "HTML5";

/// Markup version for documents whose root declares the XHTML namespace
pub const XHTML_MARKUP_VERSION: &str = "XHTML";

/// Everything extracted from one page before link verification
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    /// Partial result: `broken_links` is empty and `analysis_duration_ms` is zero
    pub result: CrawlResult,

    /// Unique HTTP(S) link targets in discovery order
    pub probe_targets: Vec<Url>,
}

/// Analyzes page content fetched from `base_url`
///
/// # Markup Version
///
/// | Condition | Version |
/// |-----------|---------|
/// | Doctype name contains "html" | HTML5 |
/// | Root `xmlns` contains "xhtml" | XHTML |
/// | Anything else | HTML5 |
///
/// # Links
///
/// Every `<a>` with a non-empty `href` is resolved against `base_url`. A link is
/// internal when it resolves to the base host or to no host at all. Hrefs that
/// fail to resolve are skipped and not counted.
///
/// # Login Forms
///
/// A form is a login form when it holds a `password` input and a `text`/`email`
/// input whose name mentions "user", "email" or "login".
///
/// # Example
///
/// ```
/// use page_lens::crawler::analyze_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><h1>A</h1><a href="/x">x</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let analysis = analyze_page(html, &base_url);
/// assert_eq!(analysis.result.title.as_deref(), Some("Test"));
/// assert_eq!(analysis.result.heading_counts.get("h1"), 1);
/// assert_eq!(analysis.result.internal_link_count, 1);
/// ```
pub fn analyze_page(html: &str, base_url: &Url) -> PageAnalysis {
    let document = Html::parse_document(html);

    let mut title = None;
    let mut seen_title = false;
    let mut heading_counts = HeadingCounts::default();
    let mut internal_link_count = 0;
    let mut external_link_count = 0;
    let mut has_login_form = false;
    let mut probe_targets = Vec::new();
    let mut seen_targets = HashSet::new();

    // Pre-order walk over the whole tree
    for node in document.tree.root().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };

        match element.value().name() {
            "title" => {
                // Only the first title counts, even when it is blank
                if !seen_title {
                    seen_title = true;
                    title = extract_title(element);
                }
            }
            "a" => {
                let Some(resolved) = element
                    .value()
                    .attr("href")
                    .and_then(|href| resolve_href(href, base_url))
                else {
                    continue;
                };

                match classify_link(&resolved, base_url) {
                    LinkScope::Internal => internal_link_count += 1,
                    LinkScope::External => external_link_count += 1,
                }

                if let Some(target) = probe_target(&resolved) {
                    if seen_targets.insert(target.as_str().to_string()) {
                        probe_targets.push(target);
                    }
                }
            }
            "form" => {
                if !has_login_form && is_login_form(element) {
                    has_login_form = true;
                }
            }
            name => {
                heading_counts.record(name);
            }
        }
    }

    tracing::debug!(
        "Analyzed {}: {} headings, {} internal / {} external links",
        base_url,
        heading_counts.total(),
        internal_link_count,
        external_link_count
    );

    PageAnalysis {
        result: CrawlResult {
            title,
            markup_version: detect_markup_version(&document).to_string(),
            heading_counts,
            internal_link_count,
            external_link_count,
            broken_links: Vec::new(),
            has_login_form,
            analysis_duration_ms: 0,
        },
        probe_targets,
    }
}

/// Extracts trimmed title text, treating blank titles as missing
fn extract_title(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let trimmed = text.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Coarse markup version heuristic; not a conformant doctype parse
fn detect_markup_version(document: &Html) -> &'static str {
    let has_html_doctype = document.tree.root().children().any(|child| match child.value() {
        Node::Doctype(doctype) => doctype.name().to_lowercase().contains("html"),
        _ => false,
    });

    if has_html_doctype {
        return DEFAULT_MARKUP_VERSION;
    }

    let declares_xhtml = document
        .root_element()
        .value()
        .attr("xmlns")
        .map_or(false, |ns| ns.to_lowercase().contains("xhtml"));

    if declares_xhtml {
        XHTML_MARKUP_VERSION
    } else {
        DEFAULT_MARKUP_VERSION
    }
}

/// Checks a single form for a password field plus a username-like field
fn is_login_form(form: ElementRef<'_>) -> bool {
    let mut has_password = false;
    let mut has_username = false;

    for node in form.descendants() {
        let Some(input) = ElementRef::wrap(node) else {
            continue;
        };
        if input.value().name() != "input" {
            continue;
        }

        let input_type = input.value().attr("type").unwrap_or("");
        if input_type.eq_ignore_ascii_case("password") {
            has_password = true;
        } else if input_type.eq_ignore_ascii_case("text") || input_type.eq_ignore_ascii_case("email") {
            let name = input.value().attr("name").unwrap_or("").to_lowercase();
            if name.contains("user") || name.contains("email") || name.contains("login") {
                has_username = true;
            }
        }

        if has_password && has_username {
            return true;
        }
    }

    false
}
