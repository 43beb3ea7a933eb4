//! Analysis result types
//!
//! `CrawlResult` is produced once per successful job execution and never
//! mutated afterwards; it is what gets persisted and what the `completed`
//! event carries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Heading tag names in level order
pub const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Occurrence counts for h1..h6; every level is always present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, u32>",
    try_from = "BTreeMap<String, u32>"
)]
pub struct HeadingCounts {
    counts: [u32; 6],
}

impl HeadingCounts {
    /// Increments the counter for a tag name; returns false for non-heading tags
    pub fn record(&mut self, tag: &str) -> bool {
        match heading_index(tag) {
            Some(index) => {
                self.counts[index] += 1;
                true
            }
            None => false,
        }
    }

    /// Count for a tag name such as "h2"; zero for anything that is not a heading
    pub fn get(&self, tag: &str) -> u32 {
        heading_index(tag).map_or(0, |index| self.counts[index])
    }

    /// Total number of heading elements counted
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Iterates `(tag, count)` pairs from h1 to h6
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        HEADING_TAGS.iter().copied().zip(self.counts.iter().copied())
    }
}

fn heading_index(tag: &str) -> Option<usize> {
    HEADING_TAGS
        .iter()
        .position(|heading| heading.eq_ignore_ascii_case(tag))
}

impl From<HeadingCounts> for BTreeMap<String, u32> {
    fn from(counts: HeadingCounts) -> Self {
        counts
            .iter()
            .map(|(tag, count)| (tag.to_string(), count))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, u32>> for HeadingCounts {
    type Error = String;

    fn try_from(map: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        let mut counts = HeadingCounts::default();
        for (tag, count) in map {
            let index = heading_index(&tag).ok_or_else(|| format!("unknown heading tag '{}'", tag))?;
            counts.counts[index] = count;
        }
        Ok(counts)
    }
}

/// A discovered link that failed its reachability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLinkEntry {
    /// The probed URL
    pub url: String,

    /// HTTP status of the probe, or 0 when the probe itself failed
    pub status_code: u16,

    /// Human-readable cause
    pub detail: String,
}

/// Structural metadata extracted from one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub title: Option<String>,
    pub markup_version: String,
    pub heading_counts: HeadingCounts,
    pub internal_link_count: u32,
    pub external_link_count: u32,
    /// In link discovery order
    pub broken_links: Vec<BrokenLinkEntry>,
    pub has_login_form: bool,
    pub analysis_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_headings() {
        let mut counts = HeadingCounts::default();
        assert!(counts.record("h1"));
        assert!(counts.record("h1"));
        assert!(counts.record("H3"));
        assert!(!counts.record("header"));
        assert!(!counts.record("h7"));

        assert_eq!(counts.get("h1"), 2);
        assert_eq!(counts.get("h3"), 1);
        assert_eq!(counts.get("h6"), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_heading_counts_serialize_zero_filled() {
        let mut counts = HeadingCounts::default();
        counts.record("h2");

        let value = serde_json::to_value(counts).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 6);
        assert_eq!(object["h1"], 0);
        assert_eq!(object["h2"], 1);
        assert_eq!(object["h6"], 0);
    }

    #[test]
    fn test_heading_counts_reject_unknown_tag() {
        let result: Result<HeadingCounts, _> = serde_json::from_str(r#"{"h9": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_crawl_result_wire_names() {
        let result = CrawlResult {
            title: Some("Test".to_string()),
            markup_version: "HTML5".to_string(),
            heading_counts: HeadingCounts::default(),
            internal_link_count: 1,
            external_link_count: 2,
            broken_links: vec![BrokenLinkEntry {
                url: "https://example.com/gone".to_string(),
                status_code: 404,
                detail: "404 Not Found".to_string(),
            }],
            has_login_form: false,
            analysis_duration_ms: 12,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["markupVersion"], "HTML5");
        assert_eq!(value["internalLinkCount"], 1);
        assert_eq!(value["brokenLinks"][0]["statusCode"], 404);
        assert_eq!(value["analysisDurationMs"], 12);

        let parsed: CrawlResult = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, result);
    }
}
