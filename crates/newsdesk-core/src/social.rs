//! The external social-platform collaborator.
//!
//! Implement [`SocialClient`] to feed the ingestion pipeline from a
//! platform API. Responses are returned as raw JSON; shape handling is the
//! job of [`crate::normalize`].

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result ordering requested from the search endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    #[default]
    Latest,
    Top,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Latest => "Latest",
            SearchMode::Top => "Top",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "latest" => Ok(SearchMode::Latest),
            "top" => Ok(SearchMode::Top),
            other => anyhow::bail!("unknown search mode: '{}'. Use latest or top.", other),
        }
    }
}

/// Search, profile lookup, and timeline fetch against a social platform.
///
/// Any error returned here fails the ingestion run that made the call.
#[async_trait]
pub trait SocialClient: Send + Sync {
    async fn search(&self, query: &str, count: u32, mode: SearchMode) -> Result<Value>;

    async fn get_profile(&self, handle: &str) -> Result<Value>;

    async fn get_timeline(&self, user_id: &str, count: u32) -> Result<Value>;
}

/// Platform identity used to label sources and build permalinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Stored as the source `type`.
    pub source_type: String,
    /// Profile base URL without trailing slash, e.g. `https://twitter.com`.
    pub base_url: String,
}

impl Platform {
    pub fn new(source_type: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            source_type: source_type.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn profile_url(&self, handle: &str) -> String {
        format!("{}/{}", self.base_url, handle)
    }

    /// Permalink for a post. Posts without a known author use the `i`
    /// placeholder path the platform redirects from.
    pub fn post_url(&self, handle: Option<&str>, external_id: &str) -> String {
        format!("{}/{}/status/{}", self.base_url, handle.unwrap_or("i"), external_id)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new("twitter", "https://twitter.com")
    }
}
