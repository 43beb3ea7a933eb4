//! State module for tracking job progress
//!
//! `JobStatus` is the persisted lifecycle state of a crawl job:
//! Queued → Running → Completed | Failed, with rerun and stop moving a job
//! back to Queued.

mod job_status;

pub use job_status::JobStatus;
