//! Storage abstraction for newsdesk.
//!
//! The [`Store`] trait covers every write the ingestion pipeline performs
//! and every read the presentation layer consumes, enabling pluggable
//! backends (SQLite in the `newsdesk` crate, in-memory here for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Uniqueness guarantees
//!
//! | Table | Key | Duplicate insert |
//! |-------|-----|------------------|
//! | posts | `external_id` | [`insert_post`](Store::insert_post) returns `None` |
//! | sources | `(name, type)` | [`get_or_create_source`](Store::get_or_create_source) returns the existing id |
//! | tags | `name` | [`ensure_tags`](Store::ensure_tags) ignores it |
//! | post tags | `(post_id, tag_id)` | [`link_tag`](Store::link_tag) is a no-op |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    IngestionRun, NewPost, NewSource, PostFilter, PostView, RunKind, RunStatus, Source, Tag,
};

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert any tag names not yet present. Tags are seed data.
    async fn ensure_tags(&self, names: &[String]) -> Result<()>;

    async fn post_exists(&self, external_id: &str) -> Result<bool>;

    /// Insert a post. Returns `None` when a post with the same
    /// `external_id` already exists; that case is not an error.
    async fn insert_post(&self, post: &NewPost) -> Result<Option<i64>>;

    /// Atomic get-or-create on `(name, source_type)`. An existing row is
    /// returned untouched.
    async fn get_or_create_source(&self, source: &NewSource) -> Result<i64>;

    async fn tag_id(&self, name: &str) -> Result<Option<i64>>;

    /// Link a post to a tag. Linking the same pair twice is a no-op.
    async fn link_tag(&self, post_id: i64, tag_id: i64) -> Result<()>;

    /// Create an `in_progress` ledger row and return its id.
    async fn begin_run(&self, kind: RunKind, params: &str, started_at: DateTime<Utc>)
        -> Result<i64>;

    /// Move run `run_id` from `in_progress` to `status`.
    ///
    /// Returns `false` if the row does not exist or is already terminal;
    /// terminal rows are never modified.
    async fn complete_run(
        &self,
        run_id: i64,
        status: RunStatus,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Fail every `in_progress` run started before `cutoff`. Returns the
    /// number of rows changed.
    async fn fail_stale_runs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Filtered, paginated posts ordered by `published_at` descending.
    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<PostView>>;

    async fn get_post(&self, id: i64) -> Result<Option<PostView>>;

    /// All tags, ordered by name.
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    /// All sources, ordered by name.
    async fn list_sources(&self) -> Result<Vec<Source>>;

    /// Most recently started runs first.
    async fn list_runs(&self, limit: u32) -> Result<Vec<IngestionRun>>;
}
