//! Core data models used throughout newsdesk.
//!
//! These types represent the candidate records produced by the normalizer,
//! the rows written by the ingestion pipeline, and the enriched views
//! returned by the read side.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in a derived post title.
pub const TITLE_MAX_CHARS: usize = 100;

/// A normalized, not-yet-persisted post extracted from a raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub external_id: String,
    pub full_text: String,
    pub author_handle: Option<String>,
    pub author_name: Option<String>,
    pub author_bio: Option<String>,
    /// Creation timestamp exactly as the platform sent it.
    pub created_at: Option<String>,
    pub media_url: Option<String>,
}

/// A post row ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub external_id: String,
    pub source_id: i64,
    pub title: String,
    pub content: String,
    pub url: String,
    pub image_url: Option<String>,
    pub author: String,
    pub published_at: DateTime<Utc>,
}

/// A source row to look up or create, keyed by `(name, source_type)`.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub source_type: String,
    pub url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A stored post enriched with its source and full tag list.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub content: String,
    pub url: String,
    pub image_url: Option<String>,
    pub author: String,
    pub published_at: String, // ISO8601
    pub external_id: String,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
    pub tags: Vec<Tag>,
    pub source: Option<Source>,
}

/// Read-side filter for [`crate::store::Store::list_posts`].
///
/// `page` is 1-based; a page of 0 is treated as page 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub tag: Option<String>,
    pub source: Option<String>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl PostFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }
}

/// The two ways an ingestion run can be triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunKind {
    QuerySearch,
    AccountBatch,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::QuerySearch => "query-search",
            RunKind::AccountBatch => "account-batch",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "query-search" => Ok(RunKind::QuerySearch),
            "account-batch" => Ok(RunKind::AccountBatch),
            other => anyhow::bail!("unknown run kind: '{}'", other),
        }
    }
}

/// Ledger status. `InProgress` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::InProgress)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "in_progress" => Ok(RunStatus::InProgress),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => anyhow::bail!("unknown run status: '{}'", other),
        }
    }
}

/// One row of the run ledger.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionRun {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: RunKind,
    pub params: String,
    pub status: RunStatus,
    pub message: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Cuts `text` to its first [`TITLE_MAX_CHARS`] characters.
///
/// This is a plain character cut, not a word-boundary truncation. Characters
/// are Unicode scalar values, so a multi-byte character is never split.
pub fn derive_title(text: &str) -> String {
    text.chars().take(TITLE_MAX_CHARS).collect()
}

pub fn format_ts_iso(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
