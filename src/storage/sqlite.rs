//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the JobStore trait.

use crate::crawler::CrawlResult;
use crate::state::JobStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobStore, StorageError, StorageResult};
use crate::storage::{CrawlJob, JobId, JobPage, JobQuery};
use crate::LensError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const JOB_COLUMNS: &str =
    "id, owner, target_url, status, result_json, failure_reason, created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(LensError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, LensError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> Result<Self, LensError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(format!("invalid timestamp '{}': {}", raw, e)))
}

/// Raw column values of one `jobs` row
struct JobRow {
    id: String,
    owner: String,
    target_url: String,
    status: String,
    result_json: Option<String>,
    failure_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            target_url: row.get(2)?,
            status: row.get(3)?,
            result_json: row.get(4)?,
            failure_reason: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_job(self) -> StorageResult<CrawlJob> {
        let id = self
            .id
            .parse::<JobId>()
            .map_err(|e| StorageError::Database(format!("invalid job id '{}': {}", self.id, e)))?;
        let status = JobStatus::from_db_string(&self.status)
            .ok_or_else(|| StorageError::InvalidStatus(self.status.clone()))?;
        let result = self
            .result_json
            .as_deref()
            .map(serde_json::from_str::<CrawlResult>)
            .transpose()?;

        Ok(CrawlJob {
            id,
            owner: self.owner,
            target_url: self.target_url,
            status,
            result,
            failure_reason: self.failure_reason,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Escapes LIKE wildcards so search text matches literally
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl JobStore for SqliteStorage {
    fn create_job(&mut self, owner: &str, target_url: &str) -> StorageResult<CrawlJob> {
        let now = Utc::now();
        let job = CrawlJob {
            id: JobId::new(),
            owner: owner.to_string(),
            target_url: target_url.to_string(),
            status: JobStatus::Queued,
            result: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.conn.execute(
            "INSERT INTO jobs (id, owner, target_url, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                job.id.to_string(),
                job.owner,
                job.target_url,
                job.status.to_db_string(),
                timestamp(now),
            ],
        )?;

        // Reload so the returned timestamps carry the stored precision
        self.load_job(job.id)
    }

    fn load_job(&self, id: JobId) -> StorageResult<CrawlJob> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS))?;

        let row = stmt
            .query_row(params![id.to_string()], JobRow::from_row)
            .optional()?
            .ok_or(StorageError::JobNotFound(id))?;

        row.into_job()
    }

    fn save_job_status(
        &mut self,
        id: JobId,
        status: JobStatus,
        result: Option<&CrawlResult>,
        failure_reason: Option<&str>,
    ) -> StorageResult<()> {
        let result_json = result.map(serde_json::to_string).transpose()?;
        let title = result.and_then(|r| r.title.as_deref());

        let updated = self.conn.execute(
            "UPDATE jobs
             SET status = ?1, title = ?2, result_json = ?3, failure_reason = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                title,
                result_json,
                failure_reason,
                timestamp(Utc::now()),
                id.to_string(),
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(id));
        }
        Ok(())
    }

    fn list_jobs_by_owner(&self, owner: &str, query: &JobQuery) -> StorageResult<JobPage> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let filter = if search.is_some() {
            "owner = ?1 AND (target_url LIKE ?2 ESCAPE '\\' OR title LIKE ?2 ESCAPE '\\')"
        } else {
            "owner = ?1"
        };

        let total: i64 = match &search {
            Some(pattern) => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM jobs WHERE {}", filter),
                params![owner, pattern],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM jobs WHERE {}", filter),
                params![owner],
                |row| row.get(0),
            )?,
        };

        // Sort column and direction come from closed enums, never from caller text
        let sql = format!(
            "SELECT {} FROM jobs WHERE {} ORDER BY {} {}, rowid {} LIMIT {} OFFSET {}",
            JOB_COLUMNS,
            filter,
            query.sort.column(),
            query.order.keyword(),
            query.order.keyword(),
            query.limit(),
            query.offset(),
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = match &search {
            Some(pattern) => stmt
                .query_map(params![owner, pattern], JobRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![owner], JobRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        let jobs = rows
            .into_iter()
            .map(JobRow::into_job)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(JobPage {
            jobs,
            total: total.max(0) as u64,
        })
    }

    fn delete_jobs(&mut self, owner: &str, ids: &[JobId]) -> StorageResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut deleted = 0u64;
        {
            let mut stmt = tx.prepare("DELETE FROM jobs WHERE id = ?1 AND owner = ?2")?;
            for id in ids {
                deleted += stmt.execute(params![id.to_string(), owner])? as u64;
            }
        }
        tx.commit()?;

        Ok(deleted)
    }
}
