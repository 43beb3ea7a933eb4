/// Job status definitions for tracking analysis progress
///
/// This module defines every state a crawl job can be in.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    // ===== Active States =====
    /// Job is stored and waiting to be started
    Queued,

    /// An analysis task has accepted the job
    Running,

    // ===== Terminal States =====
    /// Page was fetched and analyzed; the job carries a result
    Completed,

    /// Fetch or analysis failed; the job carries a failure reason
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if a job in this state may be moved to Running by a start request
    ///
    /// Terminal jobs are re-analyzed through rerun, which resets them first.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Queued)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> Vec<Self> {
        vec![Self::Queued, Self::Running, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.to_db_string())
    }
}
