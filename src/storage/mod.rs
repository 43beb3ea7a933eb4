//! Storage module for persisting crawl jobs
//!
//! This module handles all database operations for jobs, including:
//! - SQLite database initialization and schema management
//! - Job creation, lookup and owner-scoped listing
//! - Atomic status writes that keep result and failure reason consistent

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{JobStore, StorageError, StorageResult};

use crate::crawler::CrawlResult;
use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// A persisted analysis job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    pub id: JobId,
    pub owner: String,
    pub target_url: String,
    pub status: JobStatus,
    /// Present only when the job is Completed
    pub result: Option<CrawlResult>,
    /// Present only when the job is Failed
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column a job listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Url,
    Title,
    Status,
}

impl JobSort {
    /// SQL column backing this sort key
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Url => "target_url",
            Self::Title => "title",
            Self::Status => "status",
        }
    }
}

impl FromStr for JobSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            "url" => Ok(Self::Url),
            "title" => Ok(Self::Title),
            "status" => Ok(Self::Status),
            other => Err(format!("unknown sort column '{}'", other)),
        }
    }
}

/// Listing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination, ordering and filtering for owner job listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
    pub sort: JobSort,
    pub order: SortOrder,
    /// Substring matched against the URL or the result title
    pub search: Option<String>,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: JobSort::default(),
            order: SortOrder::default(),
            search: None,
        }
    }
}

impl JobQuery {
    /// Page size clamped to 1..=100
    pub fn limit(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Row offset of the requested page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit())
    }
}

/// One page of an owner's jobs plus the total matching count
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<CrawlJob>,
    pub total: u64,
}
