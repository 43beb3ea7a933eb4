//! Link verifier
//!
//! Probes every discovered link with a HEAD request and reports the ones that
//! are unreachable or answer with an error status. Probes run concurrently,
//! gated by a semaphore; outcomes flow back over a channel to a single
//! collector so no probe ever writes to shared state.

use crate::config::Config;
use crate::crawler::fetcher::build_http_client;
use crate::crawler::result::BrokenLinkEntry;
use crate::LensError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use url::Url;

/// Concurrent HEAD prober for a page's links
#[derive(Debug, Clone)]
pub struct LinkVerifier {
    client: Client,
    max_concurrent: usize,
}

impl LinkVerifier {
    /// Creates a verifier around an existing client
    ///
    /// The client's timeout is the per-probe timeout.
    pub fn new(client: Client, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Creates a verifier with the probe timeout and bound from configuration
    pub fn from_config(config: &Config) -> Result<Self, LensError> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.probe_timeout_secs),
        )?;
        Ok(Self::new(
            client,
            config.crawler.max_concurrent_probes as usize,
        ))
    }

    /// Probes all targets and returns the broken ones in target order
    ///
    /// At most `max_concurrent` probes are in flight at once. Probe failures
    /// never fail the call; only a crashed probe task does.
    pub async fn verify(&self, targets: Vec<Url>) -> Result<Vec<BrokenLinkEntry>, LensError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let total = targets.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        // Each probe sends exactly once, so sends never wait
        let (tx, mut rx) = mpsc::channel::<(usize, Option<BrokenLinkEntry>)>(total);
        let mut probes = JoinSet::new();

        for (index, target) in targets.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| LensError::Analysis(format!("probe limiter closed: {}", e)))?;
            let client = self.client.clone();
            let tx = tx.clone();

            probes.spawn(async move {
                let outcome = probe_link(&client, &target).await;
                drop(permit);
                let _ = tx.send((index, outcome)).await;
            });
        }
        drop(tx);

        let mut broken = Vec::new();
        while let Some((index, outcome)) = rx.recv().await {
            if let Some(entry) = outcome {
                broken.push((index, entry));
            }
        }

        while let Some(joined) = probes.join_next().await {
            joined.map_err(|e| LensError::Analysis(format!("link probe task failed: {}", e)))?;
        }

        broken.sort_by_key(|(index, _)| *index);

        tracing::debug!("Verified {} links, {} broken", total, broken.len());

        Ok(broken.into_iter().map(|(_, entry)| entry).collect())
    }
}

/// Probes one link; returns an entry only when the link is broken
///
/// | Outcome | status_code | detail |
/// |---------|-------------|--------|
/// | Timeout | 0 | "Request timeout" |
/// | Connect failure | 0 | "Connection failed: ..." |
/// | Other transport error | 0 | error text |
/// | HTTP >= 400 | status | status text, e.g. "404 Not Found" |
pub async fn probe_link(client: &Client, url: &Url) -> Option<BrokenLinkEntry> {
    match client.head(url.clone()).send().await {
        Ok(response) => {
            let status = response.status();
            if status.as_u16() >= 400 {
                tracing::debug!("Broken link {}: {}", url, status);
                Some(BrokenLinkEntry {
                    url: url.to_string(),
                    status_code: status.as_u16(),
                    detail: status.to_string(),
                })
            } else {
                None
            }
        }
        Err(e) => {
            let detail = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                e.to_string()
            };
            tracing::debug!("Probe failed for {}: {}", url, detail);
            Some(BrokenLinkEntry {
                url: url.to_string(),
                status_code: 0,
                detail,
            })
        }
    }
}
