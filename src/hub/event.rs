//! Lifecycle event definitions
//!
//! Events serialize to the wire record delivered to subscribers:
//!
//! ```json
//! {"type":"completed","url":"https://example.com/","status":"completed",
//!  "data":{...},"message":"Analysis completed","timestamp":"2024-01-01T00:00:00Z"}
//! ```

use crate::crawler::CrawlResult;
use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind-specific part of an event; `data` and `error` never appear together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventPayload {
    /// The job's analysis task began executing
    Started,
    /// The job ended in Failed
    Error { error: String },
    /// The job ended in Completed
    Completed { data: CrawlResult },
}

/// A job lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    /// Target URL of the job
    pub url: String,
    /// Job status after this event
    pub status: JobStatus,
    /// Human-readable summary
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CrawlEvent {
    /// Event published when a job's task starts
    pub fn started(url: impl Into<String>) -> Self {
        Self {
            payload: EventPayload::Started,
            url: url.into(),
            status: JobStatus::Running,
            message: "Analysis started".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Event published when a job fails
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            payload: EventPayload::Error {
                error: error.into(),
            },
            url: url.into(),
            status: JobStatus::Failed,
            message: "Analysis failed".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Event published when a job completes, carrying the full result
    pub fn completed(url: impl Into<String>, result: CrawlResult) -> Self {
        Self {
            payload: EventPayload::Completed { data: result },
            url: url.into(),
            status: JobStatus::Completed,
            message: "Analysis completed".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::Started => "started",
            EventPayload::Error { .. } => "error",
            EventPayload::Completed { .. } => "completed",
        }
    }

    /// Returns true for the last event a job execution publishes
    pub fn is_terminal(&self) -> bool {
        !matches!(self.payload, EventPayload::Started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::HeadingCounts;

    fn sample_result() -> CrawlResult {
        CrawlResult {
            title: Some("Test".to_string()),
            markup_version: "HTML5".to_string(),
            heading_counts: HeadingCounts::default(),
            internal_link_count: 1,
            external_link_count: 1,
            broken_links: Vec::new(),
            has_login_form: false,
            analysis_duration_ms: 5,
        }
    }

    #[test]
    fn test_started_has_neither_data_nor_error() {
        let value = serde_json::to_value(CrawlEvent::started("https://example.com/")).unwrap();
        assert_eq!(value["type"], "started");
        assert_eq!(value["status"], "running");
        assert_eq!(value["url"], "https://example.com/");
        assert!(value.get("data").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn test_error_carries_detail_only() {
        let event = CrawlEvent::failed("https://example.com/", "HTTP 500: Internal Server Error");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "HTTP 500: Internal Server Error");
        assert!(value.get("data").is_none());
        assert!(event.is_terminal());
    }

    #[test]
    fn test_completed_carries_data_only() {
        let event = CrawlEvent::completed("https://example.com/", sample_result());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "completed");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["data"]["title"], "Test");
        assert!(value.get("error").is_none());
        assert_eq!(event.kind(), "completed");
    }

    #[test]
    fn test_wire_record_parses_back() {
        let event = CrawlEvent::completed("https://example.com/", sample_result());
        let json = serde_json::to_string(&event).unwrap();
        let parsed: CrawlEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
