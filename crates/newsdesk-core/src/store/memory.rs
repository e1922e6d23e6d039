//! In-memory [`Store`] implementation for tests.
//!
//! All tables live behind a single `std::sync::RwLock`, so every
//! check-then-write sequence is atomic.

use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    format_ts_iso, IngestionRun, NewPost, NewSource, PostFilter, PostView, RunKind, RunStatus,
    Source, Tag,
};

use super::Store;

struct StoredPost {
    id: i64,
    post: NewPost,
    created_at: i64,
}

struct StoredRun {
    id: i64,
    kind: RunKind,
    params: String,
    status: RunStatus,
    message: Option<String>,
    started_at: i64,
    completed_at: Option<i64>,
}

#[derive(Default)]
struct Tables {
    posts: Vec<StoredPost>,
    sources: Vec<Source>,
    tags: Vec<Tag>,
    post_tags: BTreeSet<(i64, i64)>,
    runs: Vec<StoredRun>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with the given tag names.
    pub fn with_tags(names: &[&str]) -> Self {
        let store = Self::new();
        if let Ok(mut t) = store.tables.write() {
            for name in names {
                let id = t.tags.len() as i64 + 1;
                t.tags.push(Tag {
                    id,
                    name: name.to_string(),
                });
            }
        }
        store
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| anyhow!("store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| anyhow!("store lock poisoned"))
    }
}

impl Tables {
    fn view(&self, stored: &StoredPost) -> PostView {
        let mut tags: Vec<Tag> = self
            .post_tags
            .iter()
            .filter(|(post_id, _)| *post_id == stored.id)
            .filter_map(|(_, tag_id)| self.tags.iter().find(|t| t.id == *tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        let p = &stored.post;
        PostView {
            id: stored.id,
            source_id: p.source_id,
            title: p.title.clone(),
            content: p.content.clone(),
            url: p.url.clone(),
            image_url: p.image_url.clone(),
            author: p.author.clone(),
            published_at: format_ts_iso(p.published_at.timestamp()),
            external_id: p.external_id.clone(),
            created_at: format_ts_iso(stored.created_at),
            updated_at: format_ts_iso(stored.created_at),
            tags,
            source: self.sources.iter().find(|s| s.id == p.source_id).cloned(),
        }
    }

    fn has_tag(&self, post_id: i64, tag_name: &str) -> bool {
        self.tags
            .iter()
            .filter(|t| t.name == tag_name)
            .any(|t| self.post_tags.contains(&(post_id, t.id)))
    }

    fn source_name(&self, source_id: i64) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.id == source_id)
            .map(|s| s.name.as_str())
    }
}

/// ASCII case-insensitive substring test, matching SQLite `LIKE`.
fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

fn run_row(r: &StoredRun) -> IngestionRun {
    IngestionRun {
        id: r.id,
        kind: r.kind,
        params: r.params.clone(),
        status: r.status,
        message: r.message.clone(),
        started_at: format_ts_iso(r.started_at),
        completed_at: r.completed_at.map(format_ts_iso),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ensure_tags(&self, names: &[String]) -> Result<()> {
        let mut t = self.write()?;
        for name in names {
            if !t.tags.iter().any(|tag| &tag.name == name) {
                let id = t.tags.len() as i64 + 1;
                t.tags.push(Tag {
                    id,
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    async fn post_exists(&self, external_id: &str) -> Result<bool> {
        Ok(self
            .read()?
            .posts
            .iter()
            .any(|p| p.post.external_id == external_id))
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Option<i64>> {
        let mut t = self.write()?;
        if t.posts.iter().any(|p| p.post.external_id == post.external_id) {
            return Ok(None);
        }
        let id = t.posts.len() as i64 + 1;
        t.posts.push(StoredPost {
            id,
            post: post.clone(),
            created_at: Utc::now().timestamp(),
        });
        Ok(Some(id))
    }

    async fn get_or_create_source(&self, source: &NewSource) -> Result<i64> {
        let mut t = self.write()?;
        if let Some(existing) = t
            .sources
            .iter()
            .find(|s| s.name == source.name && s.source_type == source.source_type)
        {
            return Ok(existing.id);
        }
        let id = t.sources.len() as i64 + 1;
        t.sources.push(Source {
            id,
            name: source.name.clone(),
            source_type: source.source_type.clone(),
            url: source.url.clone(),
            description: source.description.clone(),
        });
        Ok(id)
    }

    async fn tag_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .read()?
            .tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id))
    }

    async fn link_tag(&self, post_id: i64, tag_id: i64) -> Result<()> {
        self.write()?.post_tags.insert((post_id, tag_id));
        Ok(())
    }

    async fn begin_run(
        &self,
        kind: RunKind,
        params: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut t = self.write()?;
        let id = t.runs.len() as i64 + 1;
        t.runs.push(StoredRun {
            id,
            kind,
            params: params.to_string(),
            status: RunStatus::InProgress,
            message: None,
            started_at: started_at.timestamp(),
            completed_at: None,
        });
        Ok(id)
    }

    async fn complete_run(
        &self,
        run_id: i64,
        status: RunStatus,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut t = self.write()?;
        match t
            .runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == RunStatus::InProgress)
        {
            Some(run) => {
                run.status = status;
                run.message = Some(message.to_string());
                run.completed_at = Some(completed_at.timestamp());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fail_stale_runs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut t = self.write()?;
        let mut changed = 0;
        for run in t
            .runs
            .iter_mut()
            .filter(|r| r.status == RunStatus::InProgress && r.started_at < cutoff.timestamp())
        {
            run.status = RunStatus::Failed;
            run.message = Some(message.to_string());
            run.completed_at = Some(completed_at.timestamp());
            changed += 1;
        }
        Ok(changed)
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<PostView>> {
        let t = self.read()?;
        let mut matching: Vec<&StoredPost> = t
            .posts
            .iter()
            .filter(|p| match &filter.tag {
                Some(tag) => t.has_tag(p.id, tag),
                None => true,
            })
            .filter(|p| match &filter.source {
                Some(source) => t.source_name(p.post.source_id) == Some(source.as_str()),
                None => true,
            })
            .filter(|p| match &filter.search {
                Some(q) => {
                    contains_ignore_ascii_case(&p.post.title, q)
                        || contains_ignore_ascii_case(&p.post.content, q)
                }
                None => true,
            })
            .collect();

        matching.sort_by(|a, b| {
            b.post
                .published_at
                .cmp(&a.post.published_at)
                .then(b.id.cmp(&a.id))
        });

        Ok(matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .map(|p| t.view(p))
            .collect())
    }

    async fn get_post(&self, id: i64) -> Result<Option<PostView>> {
        let t = self.read()?;
        Ok(t.posts.iter().find(|p| p.id == id).map(|p| t.view(p)))
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut tags = self.read()?.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let mut sources = self.read()?.sources.clone();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn list_runs(&self, limit: u32) -> Result<Vec<IngestionRun>> {
        let t = self.read()?;
        let mut runs: Vec<&StoredRun> = t.runs.iter().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(runs.into_iter().take(limit as usize).map(run_row).collect())
    }
}
