//! Storage traits and error types
//!
//! This module defines the trait interface for job storage backends and
//! associated error types.

use crate::crawler::CrawlResult;
use crate::state::JobStatus;
use crate::storage::{CrawlJob, JobId, JobPage, JobQuery};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Invalid job status in database: {0}")]
    InvalidStatus(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for job storage backends
///
/// Writes take `&mut self`; callers share a store behind a mutex.
pub trait JobStore {
    /// Persists a new Queued job for `owner`
    fn create_job(&mut self, owner: &str, target_url: &str) -> StorageResult<CrawlJob>;

    /// Loads a job by ID
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlJob)` - The stored job
    /// * `Err(StorageError::JobNotFound)` - No job has this ID
    fn load_job(&self, id: JobId) -> StorageResult<CrawlJob>;

    /// Writes a job's status, result and failure reason in one statement
    ///
    /// Both optional fields are always overwritten, so passing `None` clears
    /// them. Callers pass a result only with Completed and a reason only with
    /// Failed.
    fn save_job_status(
        &mut self,
        id: JobId,
        status: JobStatus,
        result: Option<&CrawlResult>,
        failure_reason: Option<&str>,
    ) -> StorageResult<()>;

    /// Lists one page of an owner's jobs
    fn list_jobs_by_owner(&self, owner: &str, query: &JobQuery) -> StorageResult<JobPage>;

    /// Deletes the listed jobs that belong to `owner`
    ///
    /// Returns the number of rows removed; IDs owned by someone else are ignored.
    fn delete_jobs(&mut self, owner: &str, ids: &[JobId]) -> StorageResult<u64>;
}
