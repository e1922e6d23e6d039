//! Payload fixtures and a scripted social client for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::models::{
    IngestionRun, NewPost, NewSource, PostFilter, PostView, RunKind, RunStatus, Source, Tag,
};
use crate::social::{SearchMode, SocialClient};
use crate::store::memory::InMemoryStore;
use crate::store::Store;

pub fn tweet(id: &str, text: &str, handle: &str) -> Value {
    tweet_at(id, text, handle, "Wed Oct 10 20:19:24 +0000 2018")
}

pub fn tweet_at(id: &str, text: &str, handle: &str, created_at: &str) -> Value {
    json!({
        "__typename": "Tweet",
        "rest_id": id,
        "core": { "user_results": { "result": { "legacy": {
            "screen_name": handle,
            "name": format!("{} display", handle),
            "description": format!("bio of {}", handle)
        } } } },
        "legacy": {
            "id_str": id,
            "full_text": text,
            "created_at": created_at
        }
    })
}

/// Wraps tweet results as single-item entries of one timeline instruction.
pub fn search_payload(tweets: Vec<Value>) -> Value {
    let entries: Vec<Value> = tweets
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            json!({
                "entryId": format!("tweet-{}", i),
                "content": { "itemContent": { "tweet_results": { "result": result } } }
            })
        })
        .collect();
    json!({ "result": { "timeline": { "instructions": [
        { "type": "TimelineAddEntries", "entries": entries }
    ] } } })
}

/// Returns canned responses; anything not scripted is an error.
#[derive(Default)]
pub struct FakeSocial {
    search: Option<Value>,
    profiles: HashMap<String, Value>,
    timelines: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
}

impl FakeSocial {
    pub fn with_search(mut self, payload: Value) -> Self {
        self.search = Some(payload);
        self
    }

    pub fn with_profile(mut self, handle: &str, profile: Value) -> Self {
        self.profiles.insert(handle.to_string(), profile);
        self
    }

    pub fn with_timeline(mut self, user_id: &str, payload: Value) -> Self {
        self.timelines.insert(user_id.to_string(), payload);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl SocialClient for FakeSocial {
    async fn search(&self, query: &str, count: u32, mode: SearchMode) -> Result<Value> {
        self.record(format!("search:{}:{}:{}", query, count, mode));
        self.search
            .clone()
            .ok_or_else(|| anyhow!("search endpoint unavailable"))
    }

    async fn get_profile(&self, handle: &str) -> Result<Value> {
        self.record(format!("profile:{}", handle));
        self.profiles
            .get(handle)
            .cloned()
            .ok_or_else(|| anyhow!("profile endpoint unavailable"))
    }

    async fn get_timeline(&self, user_id: &str, count: u32) -> Result<Value> {
        self.record(format!("timeline:{}:{}", user_id, count));
        self.timelines
            .get(user_id)
            .cloned()
            .ok_or_else(|| anyhow!("timeline endpoint unavailable"))
    }
}

/// An [`InMemoryStore`] whose post, source and tag calls fail while
/// `offline` is set. Ledger and read calls always succeed.
pub struct OfflineStore {
    pub inner: InMemoryStore,
    offline: AtomicBool,
}

impl OfflineStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(true),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("database is unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl Store for OfflineStore {
    async fn ensure_tags(&self, names: &[String]) -> Result<()> {
        self.inner.ensure_tags(names).await
    }

    async fn post_exists(&self, external_id: &str) -> Result<bool> {
        self.check()?;
        self.inner.post_exists(external_id).await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Option<i64>> {
        self.check()?;
        self.inner.insert_post(post).await
    }

    async fn get_or_create_source(&self, source: &NewSource) -> Result<i64> {
        self.check()?;
        self.inner.get_or_create_source(source).await
    }

    async fn tag_id(&self, name: &str) -> Result<Option<i64>> {
        self.check()?;
        self.inner.tag_id(name).await
    }

    async fn link_tag(&self, post_id: i64, tag_id: i64) -> Result<()> {
        self.check()?;
        self.inner.link_tag(post_id, tag_id).await
    }

    async fn begin_run(
        &self,
        kind: RunKind,
        params: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.inner.begin_run(kind, params, started_at).await
    }

    async fn complete_run(
        &self,
        run_id: i64,
        status: RunStatus,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner
            .complete_run(run_id, status, message, completed_at)
            .await
    }

    async fn fail_stale_runs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<u64> {
        self.inner.fail_stale_runs(cutoff, message, completed_at).await
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<PostView>> {
        self.inner.list_posts(filter).await
    }

    async fn get_post(&self, id: i64) -> Result<Option<PostView>> {
        self.inner.get_post(id).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.inner.list_tags().await
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        self.inner.list_sources().await
    }

    async fn list_runs(&self, limit: u32) -> Result<Vec<IngestionRun>> {
        self.inner.list_runs(limit).await
    }
}
