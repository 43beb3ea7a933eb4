//! Crawl coordinator - job lifecycle orchestration
//!
//! This module drives each job through its lifecycle:
//! - Owner-scoped job creation, lookup, listing and deletion
//! - Start, rerun and stop state transitions
//! - One spawned task per execution: fetch, analyze, verify, report
//! - Lifecycle events published to the job owner through the event hub

use crate::config::Config;
use crate::crawler::analyzer::analyze_page;
use crate::crawler::fetcher::{build_http_client, fetch_page};
use crate::crawler::result::CrawlResult;
use crate::crawler::verifier::LinkVerifier;
use crate::hub::{CrawlEvent, EventHub};
use crate::state::JobStatus;
use crate::storage::{CrawlJob, JobId, JobPage, JobQuery, JobStore, StorageError, StorageResult};
use crate::url::validate_target_url;
use crate::LensError;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use url::Url;

/// Job orchestrator
///
/// Cheap to clone; clones share storage, the hub, HTTP clients and the set of
/// jobs with an execution in flight.
pub struct Coordinator<S> {
    storage: Arc<Mutex<S>>,
    hub: EventHub,
    client: Client,
    verifier: LinkVerifier,
    active: Arc<Mutex<HashSet<JobId>>>,
}

impl<S> Clone for Coordinator<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            hub: self.hub.clone(),
            client: self.client.clone(),
            verifier: self.verifier.clone(),
            active: Arc::clone(&self.active),
        }
    }
}

/// Marks a job as having an execution in flight until dropped
struct ActiveJob {
    id: JobId,
    active: Arc<Mutex<HashSet<JobId>>>,
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl<S> Coordinator<S>
where
    S: JobStore + Send + 'static,
{
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `config` - Timeouts, probe concurrency and user agent
    /// * `storage` - Job store shared by every execution
    /// * `hub` - Event hub receiving lifecycle events
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to accept jobs
    /// * `Err(LensError)` - HTTP clients could not be built
    pub fn new(config: &Config, storage: S, hub: EventHub) -> Result<Self, LensError> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.page_timeout_secs),
        )?;
        let verifier = LinkVerifier::from_config(config)?;

        Ok(Self {
            storage: Arc::new(Mutex::new(storage)),
            hub,
            client,
            verifier,
            active: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Event hub this coordinator publishes to
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Validates the target URL and stores a new Queued job
    pub fn create_job(&self, owner: &str, target_url: &str) -> Result<CrawlJob, LensError> {
        let url = validate_target_url(target_url)?;
        let job = self.with_storage(|s| s.create_job(owner, url.as_str()))?;
        tracing::info!("Created job {} for {} (owner: {})", job.id, job.target_url, owner);
        Ok(job)
    }

    /// Loads one of `owner`'s jobs
    pub fn get_job(&self, owner: &str, id: JobId) -> Result<CrawlJob, LensError> {
        self.load_owned(owner, id)
    }

    /// Lists one page of `owner`'s jobs
    pub fn list_jobs(&self, owner: &str, query: &JobQuery) -> Result<JobPage, LensError> {
        Ok(self.with_storage(|s| s.list_jobs_by_owner(owner, query))?)
    }

    /// Deletes `owner`'s jobs among `ids`; returns how many were removed
    pub fn delete_jobs(&self, owner: &str, ids: &[JobId]) -> Result<u64, LensError> {
        let deleted = self.with_storage(|s| s.delete_jobs(owner, ids))?;
        tracing::info!("Deleted {} of {} requested jobs (owner: {})", deleted, ids.len(), owner);
        Ok(deleted)
    }

    /// Starts a Queued job
    ///
    /// Marks the job Running and spawns its execution. The returned handle
    /// resolves once the outcome has been published and persisted.
    ///
    /// # Errors
    ///
    /// * `JobNotFound` - No such job for this owner
    /// * `JobAlreadyRunning` - An execution for the job is still in flight
    /// * `InvalidTransition` - The job is not Queued; use rerun instead
    pub fn start_job(&self, owner: &str, id: JobId) -> Result<JoinHandle<()>, LensError> {
        let job = self.load_owned(owner, id)?;
        let guard = self.claim(id)?;

        if !job.status.can_start() {
            return Err(LensError::InvalidTransition {
                from: job.status,
                to: JobStatus::Running,
            });
        }

        self.launch(job, guard)
    }

    /// Resets any job to Queued, clearing its previous outcome, and starts it
    ///
    /// # Errors
    ///
    /// * `JobNotFound` - No such job for this owner
    /// * `JobAlreadyRunning` - An execution for the job is still in flight
    pub fn rerun_job(&self, owner: &str, id: JobId) -> Result<JoinHandle<()>, LensError> {
        let job = self.load_owned(owner, id)?;
        let guard = self.claim(id)?;

        self.with_storage(|s| s.save_job_status(id, JobStatus::Queued, None, None))?;
        tracing::info!("Job {} reset to queued for rerun", id);

        self.launch(job, guard)
    }

    /// Forces a job's persisted status back to Queued
    ///
    /// An execution already in flight is not interrupted and records its own
    /// outcome when it finishes.
    pub fn stop_job(&self, owner: &str, id: JobId) -> Result<(), LensError> {
        let job = self.load_owned(owner, id)?;
        self.with_storage(|s| s.save_job_status(id, JobStatus::Queued, None, None))?;

        if job.status == JobStatus::Running {
            tracing::info!("Job {} stopped; in-flight analysis will still report", id);
        } else {
            tracing::info!("Job {} reset to queued", id);
        }
        Ok(())
    }

    fn launch(&self, job: CrawlJob, guard: ActiveJob) -> Result<JoinHandle<()>, LensError> {
        self.with_storage(|s| s.save_job_status(job.id, JobStatus::Running, None, None))?;
        tracing::info!("Job {} running for {}", job.id, job.target_url);

        let coordinator = self.clone();
        Ok(tokio::spawn(async move {
            coordinator.run_job(job).await;
            drop(guard);
        }))
    }

    /// One execution: fetch, analyze, verify, then report exactly one outcome
    async fn run_job(&self, job: CrawlJob) {
        let started = Instant::now();

        self.publish(&job.owner, CrawlEvent::started(&job.target_url))
            .await;

        match self.analyze(&job, started).await {
            Ok(result) => {
                tracing::info!(
                    "Job {} completed in {}ms: {} internal, {} external, {} broken",
                    job.id,
                    result.analysis_duration_ms,
                    result.internal_link_count,
                    result.external_link_count,
                    result.broken_links.len()
                );
                self.publish(&job.owner, CrawlEvent::completed(&job.target_url, result.clone()))
                    .await;
                self.persist(job.id, JobStatus::Completed, Some(&result), None);
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!("Job {} failed: {}", job.id, reason);
                self.publish(&job.owner, CrawlEvent::failed(&job.target_url, reason.as_str()))
                    .await;
                self.persist(job.id, JobStatus::Failed, None, Some(&reason));
            }
        }
    }

    async fn analyze(&self, job: &CrawlJob, started: Instant) -> Result<CrawlResult, LensError> {
        let target = Url::parse(&job.target_url)?;
        let page = fetch_page(&self.client, &target).await?;

        let base_url = page.final_url;
        let body = page.body;
        let analysis = tokio::task::spawn_blocking(move || analyze_page(&body, &base_url))
            .await
            .map_err(|e| LensError::Analysis(format!("page analysis task failed: {}", e)))?;

        let mut result = analysis.result;
        result.broken_links = self.verifier.verify(analysis.probe_targets).await?;
        result.analysis_duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(result)
    }

    async fn publish(&self, owner: &str, event: CrawlEvent) {
        if let Err(e) = self.hub.publish_to_owner(owner, event).await {
            tracing::warn!("Could not publish event for owner {}: {}", owner, e);
        }
    }

    fn persist(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<&CrawlResult>,
        failure_reason: Option<&str>,
    ) {
        if let Err(e) = self.with_storage(|s| s.save_job_status(id, status, result, failure_reason)) {
            tracing::warn!("Failed to persist {} status for job {}: {}", status, id, e);
        }
    }

    fn claim(&self, id: JobId) -> Result<ActiveJob, LensError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(id) {
            return Err(LensError::JobAlreadyRunning(id));
        }
        Ok(ActiveJob {
            id,
            active: Arc::clone(&self.active),
        })
    }

    fn load_owned(&self, owner: &str, id: JobId) -> Result<CrawlJob, LensError> {
        let job = self.with_storage(|s| s.load_job(id)).map_err(|e| match e {
            StorageError::JobNotFound(id) => LensError::JobNotFound(id),
            other => other.into(),
        })?;

        if job.owner != owner {
            return Err(LensError::JobNotFound(id));
        }
        Ok(job)
    }

    fn with_storage<T>(&self, f: impl FnOnce(&mut S) -> StorageResult<T>) -> StorageResult<T> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))?;
        f(&mut storage)
    }
}
