//! HTTP fetcher implementation
//!
//! This module handles the top-level page request for a job:
//! - Building HTTP clients with the configured user agent and timeout
//! - GET requests for the submitted page
//! - Error classification (timeout, transport, non-2xx)

use crate::config::UserAgentConfig;
use crate::LensError;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed for pages and probes
const MAX_REDIRECTS: usize = 10;

/// Connect timeout ceiling; the overall request timeout may be shorter
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A successfully fetched page
#[derive(Debug)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: String,
    /// Page body content
    pub body: String,
}

/// Formats the user agent string: `CrawlerName/Version (+ContactURL)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{})",
        config.crawler_name, config.crawler_version, config.contact_url
    )
}

/// Builds an HTTP client with the given request timeout
///
/// # Example
///
/// ```no_run
/// use page_lens::config::UserAgentConfig;
/// use page_lens::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(timeout)
        .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches the page a job targets
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | `Ok(FetchedPage)` |
/// | Other status | `LensError::HttpStatus` |
/// | Client timeout | `LensError::Timeout` |
/// | Connection/DNS/TLS failure | `LensError::Http` |
pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchedPage, LensError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LensError::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = response.text().await.map_err(|e| classify_error(url, e))?;

    tracing::debug!(
        "Fetched {} ({} bytes, status {}, content-type '{}')",
        final_url,
        body.len(),
        status.as_u16(),
        content_type
    );

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body,
    })
}

fn classify_error(url: &Url, error: reqwest::Error) -> LensError {
    if error.is_timeout() {
        LensError::Timeout {
            url: url.to_string(),
        }
    } else {
        LensError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
