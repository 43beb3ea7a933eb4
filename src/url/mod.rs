//! URL handling module for Page-Lens
//!
//! This module validates submitted target URLs, resolves link hrefs against a
//! page's base URL, and classifies resolved links as internal or external.

use crate::UrlError;
use url::Url;

/// Link scope relative to the analyzed page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkScope {
    /// Same host as the page, or no host at all (path-only, fragment, mailto, ...)
    Internal,
    /// Any other host
    External,
}

/// Validates a submitted target URL
///
/// A target must be an absolute `http` or `https` URL with a host.
///
/// # Examples
///
/// ```
/// use page_lens::url::validate_target_url;
///
/// assert!(validate_target_url("https://example.com/docs").is_ok());
/// assert!(validate_target_url("/relative").is_err());
/// assert!(validate_target_url("ftp://example.com/").is_err());
/// ```
pub fn validate_target_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Resolves an href against the page's base URL
///
/// Returns None for empty or malformed hrefs; those links are not counted.
pub fn resolve_href(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    base_url.join(href).ok()
}

/// Classifies a resolved link against the base URL
///
/// Hosts are compared together with their explicit port, so
/// `https://example.com:8443/` is external to `https://example.com/`.
pub fn classify_link(resolved: &Url, base_url: &Url) -> LinkScope {
    match resolved.host_str() {
        None | Some("") => LinkScope::Internal,
        Some(host) => {
            let same_host = base_url
                .host_str()
                .map_or(false, |base| base.eq_ignore_ascii_case(host));

            if same_host && resolved.port() == base_url.port() {
                LinkScope::Internal
            } else {
                LinkScope::External
            }
        }
    }
}

/// Converts a resolved link into the URL a reachability probe should hit
///
/// Only HTTP and HTTPS links are probed. The fragment is dropped because it is
/// never sent to the server.
pub fn probe_target(resolved: &Url) -> Option<Url> {
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }

    let mut target = resolved.clone();
    target.set_fragment(None);
    Some(target)
}
