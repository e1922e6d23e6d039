//! Ingestion pipeline orchestration.
//!
//! Coordinates one ingestion run: social client → normalization → dedup
//! check → source resolution → post insert → tag classification → tag
//! links. The run ledger brackets the whole invocation.
//!
//! Failures are contained at two levels:
//!
//! - **Per record.** A missing or unparseable timestamp is logged and
//!   counted; the batch continues.
//! - **Per run.** A social client error or any store error fails the run.
//!   The caller always receives an [`UpdateOutcome`], never an error.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::classify::Taxonomy;
use crate::ledger;
use crate::models::{derive_title, CandidateRecord, NewPost, RunKind};
use crate::normalize::{normalize, profile_user_id, ParsedEntry};
use crate::resolve::resolve_source;
use crate::social::{Platform, SearchMode, SocialClient};
use crate::store::Store;

/// Twitter's legacy `created_at` layout, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const PLATFORM_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Counters for one batch or run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// New posts stored.
    pub processed: u64,
    /// Posts already present by external id.
    pub skipped: u64,
    /// Candidate records that failed to store.
    pub failed: u64,
    /// Payload entries that were not recognizable posts.
    pub dropped: u64,
}

impl IngestStats {
    fn absorb(&mut self, other: IngestStats) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.dropped += other.dropped;
    }

    fn summary(&self) -> String {
        format!(
            "{} new, {} already stored, {} failed, {} unrecognized",
            self.processed, self.skipped, self.failed, self.dropped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordOutcome {
    Stored { post_id: i64, tags: usize },
    AlreadyPresent,
}

/// Why a record was not stored.
#[derive(Debug)]
enum RecordError {
    /// The record is unusable; only it is skipped.
    Malformed(anyhow::Error),
    /// The store failed; the batch stops.
    Storage(anyhow::Error),
}

/// Parses a platform creation timestamp into UTC.
///
/// Accepts the platform's legacy layout and RFC 3339.
pub fn parse_created_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(raw, PLATFORM_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("unparseable created_at '{}'", raw))
}

/// Stores candidate records: the per-batch half of the coordinator.
pub struct Ingestor<'a> {
    store: &'a dyn Store,
    taxonomy: &'a Taxonomy,
    platform: &'a Platform,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn Store, taxonomy: &'a Taxonomy, platform: &'a Platform) -> Self {
        Self {
            store,
            taxonomy,
            platform,
        }
    }

    /// Normalizes `payload` and ingests every recognizable post in it.
    pub async fn ingest_payload(&self, payload: &Value) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        self.ingest_payload_into(payload, &mut stats).await?;
        Ok(stats)
    }

    /// Like [`ingest_payload`](Self::ingest_payload), counting into `stats`
    /// so the work done before a store failure is still reported.
    pub async fn ingest_payload_into(&self, payload: &Value, stats: &mut IngestStats) -> Result<()> {
        for parsed in normalize(payload) {
            match parsed {
                ParsedEntry::Candidate(record) => self.ingest_record(&record, stats).await?,
                ParsedEntry::Unrecognized { entry_id, error } => {
                    tracing::debug!(entry_id = ?entry_id, reason = %error, "Dropping timeline entry");
                    stats.dropped += 1;
                }
            }
        }
        Ok(())
    }

    /// Ingests records in order. A malformed record is skipped; a store
    /// error stops the batch.
    pub async fn ingest<I>(&self, records: I) -> Result<IngestStats>
    where
        I: IntoIterator<Item = CandidateRecord>,
    {
        let mut stats = IngestStats::default();
        for record in records {
            self.ingest_record(&record, &mut stats).await?;
        }
        Ok(stats)
    }

    async fn ingest_record(&self, record: &CandidateRecord, stats: &mut IngestStats) -> Result<()> {
        match self.store_record(record).await {
            Ok(RecordOutcome::Stored { post_id, tags }) => {
                tracing::debug!(
                    external_id = %record.external_id,
                    post_id,
                    tags,
                    "Stored post"
                );
                stats.processed += 1;
            }
            Ok(RecordOutcome::AlreadyPresent) => {
                tracing::debug!(external_id = %record.external_id, "Post already stored");
                stats.skipped += 1;
            }
            Err(RecordError::Malformed(e)) => {
                tracing::warn!(
                    external_id = %record.external_id,
                    handle = ?record.author_handle,
                    error = %format!("{:#}", e),
                    "Skipping malformed post"
                );
                stats.failed += 1;
            }
            Err(RecordError::Storage(e)) => {
                return Err(e.context(format!(
                    "storage failed while ingesting post {}",
                    record.external_id
                )));
            }
        }
        Ok(())
    }

    async fn store_record(&self, record: &CandidateRecord) -> Result<RecordOutcome, RecordError> {
        if self
            .store
            .post_exists(&record.external_id)
            .await
            .map_err(RecordError::Storage)?
        {
            return Ok(RecordOutcome::AlreadyPresent);
        }

        let raw_ts = record
            .created_at
            .as_deref()
            .ok_or_else(|| RecordError::Malformed(anyhow!("post has no created_at")))?;
        let published_at = parse_created_at(raw_ts).map_err(RecordError::Malformed)?;

        let handle = record.author_handle.as_deref();
        let source_id = resolve_source(
            self.store,
            self.platform,
            handle,
            record.author_bio.as_deref(),
        )
        .await
        .map_err(RecordError::Storage)?;

        let post = NewPost {
            external_id: record.external_id.clone(),
            source_id,
            title: derive_title(&record.full_text),
            content: record.full_text.clone(),
            url: self.platform.post_url(handle, &record.external_id),
            image_url: record.media_url.clone(),
            author: record
                .author_name
                .as_deref()
                .or(handle)
                .unwrap_or(crate::resolve::UNKNOWN_SOURCE)
                .to_string(),
            published_at,
        };

        // The unique key on external_id settles races with concurrent runs.
        let post_id = match self.store.insert_post(&post).await.map_err(RecordError::Storage)? {
            Some(id) => id,
            None => return Ok(RecordOutcome::AlreadyPresent),
        };

        let mut linked = 0;
        for tag in self.taxonomy.classify(&record.full_text) {
            match self.store.tag_id(&tag).await.map_err(RecordError::Storage)? {
                Some(tag_id) => {
                    self.store
                        .link_tag(post_id, tag_id)
                        .await
                        .map_err(RecordError::Storage)?;
                    linked += 1;
                }
                None => tracing::warn!(tag = %tag, "Tag is not seeded; skipping link"),
            }
        }

        Ok(RecordOutcome::Stored {
            post_id,
            tags: linked,
        })
    }
}

/// What to ingest in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRequest {
    /// One page of search results for `query`.
    QuerySearch {
        query: String,
        count: u32,
        mode: SearchMode,
    },
    /// Recent posts from each account in `accounts`.
    AccountBatch {
        accounts: Vec<String>,
        count_per_account: u32,
    },
}

impl UpdateRequest {
    pub fn kind(&self) -> RunKind {
        match self {
            UpdateRequest::QuerySearch { .. } => RunKind::QuerySearch,
            UpdateRequest::AccountBatch { .. } => RunKind::AccountBatch,
        }
    }

    /// Human-readable request description stored in the ledger.
    pub fn params(&self) -> String {
        match self {
            UpdateRequest::QuerySearch { query, .. } => query.clone(),
            UpdateRequest::AccountBatch { accounts, .. } => accounts.join(","),
        }
    }
}

/// Structured result of a triggered run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub success: bool,
    pub message: String,
    pub run_id: Option<i64>,
    pub stats: IngestStats,
}

/// Runs ingestion requests end to end.
pub struct Coordinator<'a> {
    store: &'a dyn Store,
    client: &'a dyn SocialClient,
    taxonomy: &'a Taxonomy,
    platform: &'a Platform,
    stale_after: Duration,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        store: &'a dyn Store,
        client: &'a dyn SocialClient,
        taxonomy: &'a Taxonomy,
        platform: &'a Platform,
    ) -> Self {
        Self {
            store,
            client,
            taxonomy,
            platform,
            stale_after: Duration::minutes(60),
        }
    }

    /// Age after which an `in_progress` run is considered abandoned.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Executes `request` inside a ledger bracket.
    pub async fn run(&self, request: &UpdateRequest) -> UpdateOutcome {
        if let Err(e) = ledger::fail_stale(self.store, self.stale_after).await {
            tracing::warn!(error = %format!("{:#}", e), "Could not reap stale runs");
        }

        let run_id = match ledger::begin(self.store, request.kind(), &request.params()).await {
            Ok(id) => id,
            Err(e) => {
                return UpdateOutcome {
                    success: false,
                    message: format!("Error updating news: {:#}", e),
                    run_id: None,
                    stats: IngestStats::default(),
                }
            }
        };

        let mut stats = IngestStats::default();
        let result = match request {
            UpdateRequest::QuerySearch { query, count, mode } => {
                self.collect_search(query, *count, *mode, &mut stats).await
            }
            UpdateRequest::AccountBatch {
                accounts,
                count_per_account,
            } => {
                self.collect_accounts(accounts, *count_per_account, &mut stats)
                    .await
            }
        };

        let (mut success, mut message) = match result {
            Ok(message) => (true, message),
            Err(e) => (
                false,
                format!(
                    "Error collecting news: {:#} (before failure: {})",
                    e,
                    stats.summary()
                ),
            ),
        };

        match ledger::complete(self.store, run_id, success, &message).await {
            Ok(true) => {}
            Ok(false) => {
                success = false;
                message = format!(
                    "{}; run was marked abandoned before it completed",
                    message
                );
            }
            Err(e) => {
                tracing::error!(run_id, error = %format!("{:#}", e), "Run ledger not updated");
                success = false;
                message = format!("{}; run ledger not updated: {:#}", message, e);
            }
        }

        UpdateOutcome {
            success,
            message,
            run_id: Some(run_id),
            stats,
        }
    }

    async fn collect_search(
        &self,
        query: &str,
        count: u32,
        mode: SearchMode,
        stats: &mut IngestStats,
    ) -> Result<String> {
        tracing::info!(query, count, mode = %mode, "Collecting posts from search");
        let payload = self
            .client
            .search(query, count, mode)
            .await
            .context("search request failed")?;

        self.ingestor()
            .ingest_payload_into(&payload, stats)
            .await?;

        Ok(format!(
            "Collected and processed {} posts for query \"{}\" ({})",
            stats.processed + stats.skipped,
            query,
            stats.summary()
        ))
    }

    async fn collect_accounts(
        &self,
        accounts: &[String],
        count_per_account: u32,
        stats: &mut IngestStats,
    ) -> Result<String> {
        let ingestor = self.ingestor();
        let mut resolved = 0usize;

        for handle in accounts {
            let profile = self
                .client
                .get_profile(handle)
                .await
                .with_context(|| format!("profile lookup failed for '{}'", handle))?;

            let user_id = match profile_user_id(&profile) {
                Some(id) => id,
                None => {
                    tracing::warn!(handle = %handle, "Could not find user id; skipping account");
                    continue;
                }
            };

            let payload = self
                .client
                .get_timeline(&user_id, count_per_account)
                .await
                .with_context(|| format!("timeline fetch failed for '{}'", handle))?;

            let mut account_stats = IngestStats::default();
            let ingested = ingestor
                .ingest_payload_into(&payload, &mut account_stats)
                .await;
            stats.absorb(account_stats);
            ingested?;
            tracing::info!(
                handle = %handle,
                processed = account_stats.processed,
                skipped = account_stats.skipped,
                failed = account_stats.failed,
                "Account ingested"
            );
            resolved += 1;
        }

        Ok(format!(
            "Collected and processed {} posts from {} of {} accounts ({})",
            stats.processed + stats.skipped,
            resolved,
            accounts.len(),
            stats.summary()
        ))
    }

    fn ingestor(&self) -> Ingestor<'_> {
        Ingestor::new(self.store, self.taxonomy, self.platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostFilter, RunStatus};
    use crate::store::memory::InMemoryStore;
    use crate::testutil::{search_payload, tweet, tweet_at, FakeSocial, OfflineStore};
    use async_trait::async_trait;
    use serde_json::json;

    /// Reaps every open run while the search request is in flight.
    struct ReapingSocial<'a> {
        store: &'a InMemoryStore,
        payload: Value,
    }

    #[async_trait]
    impl<'a> SocialClient for ReapingSocial<'a> {
        async fn search(&self, _query: &str, _count: u32, _mode: SearchMode) -> Result<Value> {
            let now = Utc::now();
            self.store
                .fail_stale_runs(now + Duration::minutes(1), ledger::ABANDONED_MESSAGE, now)
                .await?;
            Ok(self.payload.clone())
        }

        async fn get_profile(&self, handle: &str) -> Result<Value> {
            Err(anyhow!("no profile for {}", handle))
        }

        async fn get_timeline(&self, user_id: &str, _count: u32) -> Result<Value> {
            Err(anyhow!("no timeline for {}", user_id))
        }
    }

    async fn store_with_taxonomy(taxonomy: &Taxonomy) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.ensure_tags(&taxonomy.tag_names()).await.unwrap();
        store
    }

    fn record(id: &str, text: &str, handle: &str) -> CandidateRecord {
        CandidateRecord {
            external_id: id.to_string(),
            full_text: text.to_string(),
            author_handle: Some(handle.to_string()),
            author_name: Some(format!("{} display", handle)),
            author_bio: None,
            created_at: Some("Wed Oct 10 20:19:24 +0000 2018".to_string()),
            media_url: None,
        }
    }

    #[test]
    fn test_parse_created_at_formats() {
        let legacy = parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(legacy.to_rfc3339(), "2018-10-10T20:19:24+00:00");
        let offset = parse_created_at("Wed Oct 10 22:19:24 +0200 2018").unwrap();
        assert_eq!(offset, legacy);
        let rfc = parse_created_at("2018-10-10T20:19:24Z").unwrap();
        assert_eq!(rfc, legacy);
        assert!(parse_created_at("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);
        let payload = search_payload(vec![
            tweet("1", "LLM agents are here", "alice"),
            tweet("2", "another one", "bob"),
        ]);

        let first = ingestor.ingest_payload(&payload).await.unwrap();
        assert_eq!(first.processed, 2);
        assert_eq!(first.skipped, 0);

        let second = ingestor.ingest_payload(&payload).await.unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.skipped, 2);

        let posts = store
            .list_posts(&PostFilter { page: 1, limit: 50, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_same_author_creates_one_source() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);

        let stats = ingestor
            .ingest(vec![
                record("1", "one", "alice"),
                record("2", "two", "alice"),
                record("3", "three", "bob"),
            ])
            .await
            .unwrap();
        assert_eq!(stats.processed, 3);

        let sources = store.list_sources().await.unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_post_fields_are_derived() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);

        let long_text = format!("new LLM research paper {}", "x".repeat(200));
        let mut r = record("77", &long_text, "lab");
        r.media_url = Some("https://pbs.example/a.jpg".to_string());
        ingestor.ingest(vec![r]).await.unwrap();

        let post = store.get_post(1).await.unwrap().unwrap();
        assert_eq!(post.title.chars().count(), 100);
        assert!(long_text.starts_with(&post.title));
        assert_eq!(post.content, long_text);
        assert_eq!(post.url, "https://twitter.com/lab/status/77");
        assert_eq!(post.image_url.as_deref(), Some("https://pbs.example/a.jpg"));
        assert_eq!(post.author, "lab display");
        assert_eq!(post.published_at, "2018-10-10T20:19:24Z");
        let tags: Vec<_> = post.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["AI Research", "LLM"]);
        assert_eq!(post.source.unwrap().url.as_deref(), Some("https://twitter.com/lab"));
    }

    #[tokio::test]
    async fn test_author_falls_back_to_handle_then_unknown() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);

        let mut named_by_handle = record("1", "a", "handle_only");
        named_by_handle.author_name = None;
        let mut anonymous = record("2", "b", "x");
        anonymous.author_handle = None;
        anonymous.author_name = None;
        ingestor.ingest(vec![named_by_handle, anonymous]).await.unwrap();

        assert_eq!(store.get_post(1).await.unwrap().unwrap().author, "handle_only");
        let anon = store.get_post(2).await.unwrap().unwrap();
        assert_eq!(anon.author, "Unknown");
        assert_eq!(anon.url, "https://twitter.com/i/status/2");
        let source = anon.source.unwrap();
        assert_eq!(source.name, "Unknown");
        assert_eq!(source.url, None);
    }

    #[tokio::test]
    async fn test_bad_record_does_not_abort_batch() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);

        let mut bad_ts = record("2", "bad time", "a");
        bad_ts.created_at = Some("not a date".to_string());
        let mut no_ts = record("3", "no time", "a");
        no_ts.created_at = None;

        let stats = ingestor
            .ingest(vec![record("1", "ok", "a"), bad_ts, no_ts, record("4", "ok", "a")])
            .await
            .unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 2);
        assert!(!store.post_exists("2").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_entry_in_batch_of_ten() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);

        let mut tweets: Vec<Value> = (0..9)
            .map(|i| tweet(&i.to_string(), "valid post", "author"))
            .collect();
        let mut missing_id = tweet("x", "no id here", "author");
        missing_id["legacy"].as_object_mut().unwrap().remove("id_str");
        tweets.insert(4, missing_id);

        let stats = ingestor.ingest_payload(&search_payload(tweets)).await.unwrap();
        assert_eq!(stats.processed, 9);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_unseeded_tags_are_skipped() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = InMemoryStore::with_tags(&["LLM"]);
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);

        let stats = ingestor
            .ingest(vec![record("1", "LLM research paper", "a")])
            .await
            .unwrap();
        assert_eq!(stats.processed, 1);
        let post = store.get_post(1).await.unwrap().unwrap();
        assert_eq!(post.tags.len(), 1);
        assert_eq!(post.tags[0].name, "LLM");
    }

    #[tokio::test]
    async fn test_query_search_run_succeeds() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let client = FakeSocial::default().with_search(search_payload(vec![
            tweet("1", "GPT news", "a"),
            tweet("2", "lunch", "b"),
        ]));
        let coordinator = Coordinator::new(&store, &client, &taxonomy, &platform);

        let outcome = coordinator
            .run(&UpdateRequest::QuerySearch {
                query: "AI agent".to_string(),
                count: 20,
                mode: SearchMode::Latest,
            })
            .await;

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.stats.processed, 2);
        assert!(outcome.message.contains("\"AI agent\""));

        let runs = store.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(Some(runs[0].id), outcome.run_id);
        assert_eq!(runs[0].kind, RunKind::QuerySearch);
        assert_eq!(runs[0].params, "AI agent");
        assert_eq!(runs[0].status, RunStatus::Success);
        assert!(runs[0].completed_at.is_some());

        let calls = client.calls();
        assert_eq!(calls, vec!["search:AI agent:20:Latest".to_string()]);
    }

    #[tokio::test]
    async fn test_search_failure_fails_the_run() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let client = FakeSocial::default();
        let coordinator = Coordinator::new(&store, &client, &taxonomy, &platform);

        let outcome = coordinator
            .run(&UpdateRequest::QuerySearch {
                query: "q".to_string(),
                count: 5,
                mode: SearchMode::Top,
            })
            .await;

        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Error collecting news"));
        let runs = store.list_runs(10).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].message.as_deref(), Some(outcome.message.as_str()));
    }

    #[tokio::test]
    async fn test_account_batch_skips_unresolvable_handles() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let client = FakeSocial::default()
            .with_profile("OpenAI", json!({ "result": { "data": { "user": { "result": { "rest_id": "100" } } } } }))
            .with_profile("ghost", json!({ "result": { "data": {} } }))
            .with_profile("DeepMind", json!({ "result": { "data": { "user": { "result": { "rest_id": "200" } } } } }))
            .with_timeline("100", search_payload(vec![tweet_at("1", "GPT", "OpenAI", "Thu Oct 11 10:00:00 +0000 2018")]))
            .with_timeline("200", search_payload(vec![tweet("2", "research", "DeepMind")]));
        let coordinator = Coordinator::new(&store, &client, &taxonomy, &platform);

        let outcome = coordinator
            .run(&UpdateRequest::AccountBatch {
                accounts: vec!["OpenAI".into(), "ghost".into(), "DeepMind".into()],
                count_per_account: 10,
            })
            .await;

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.stats.processed, 2);
        assert!(outcome.message.contains("from 2 of 3 accounts"));
        let runs = store.list_runs(10).await.unwrap();
        assert_eq!(runs[0].params, "OpenAI,ghost,DeepMind");
        assert_eq!(runs[0].kind, RunKind::AccountBatch);

        let newest = store
            .list_posts(&PostFilter { page: 1, limit: 1, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(newest[0].external_id, "1");
    }

    #[tokio::test]
    async fn test_timeline_error_fails_account_batch() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let client = FakeSocial::default()
            .with_profile("a", json!({ "result": { "data": { "user": { "result": { "rest_id": "1" } } } } }));
        let coordinator = Coordinator::new(&store, &client, &taxonomy, &platform);

        let outcome = coordinator
            .run(&UpdateRequest::AccountBatch {
                accounts: vec!["a".into()],
                count_per_account: 3,
            })
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("timeline fetch failed for 'a'"));
    }

    #[tokio::test]
    async fn test_run_reaps_stale_rows_first() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let stuck = store
            .begin_run(RunKind::QuerySearch, "old", Utc::now() - Duration::hours(5))
            .await
            .unwrap();
        let client = FakeSocial::default().with_search(search_payload(vec![]));
        let coordinator = Coordinator::new(&store, &client, &taxonomy, &platform)
            .with_stale_after(Duration::minutes(30));

        let outcome = coordinator
            .run(&UpdateRequest::QuerySearch {
                query: "q".into(),
                count: 1,
                mode: SearchMode::Latest,
            })
            .await;
        assert!(outcome.success);

        let runs = store.list_runs(10).await.unwrap();
        let stuck_row = runs.iter().find(|r| r.id == stuck).unwrap();
        assert_eq!(stuck_row.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_store_error_stops_the_batch() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = OfflineStore::new(store_with_taxonomy(&taxonomy).await);
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);

        let err = ingestor
            .ingest(vec![record("1", "one", "a"), record("2", "two", "a")])
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("database is unavailable"));
        assert!(!store.inner.post_exists("1").await.unwrap());

        store.set_offline(false);
        let stats = ingestor
            .ingest(vec![record("1", "one", "a"), record("2", "two", "a")])
            .await
            .unwrap();
        assert_eq!(stats.processed, 2);
    }

    #[tokio::test]
    async fn test_store_outage_fails_the_run() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = OfflineStore::new(store_with_taxonomy(&taxonomy).await);
        let client = FakeSocial::default().with_search(search_payload(vec![
            tweet("1", "one", "a"),
            tweet("2", "two", "b"),
            tweet("3", "three", "c"),
        ]));
        let coordinator = Coordinator::new(&store, &client, &taxonomy, &platform);

        let outcome = coordinator
            .run(&UpdateRequest::QuerySearch {
                query: "q".into(),
                count: 3,
                mode: SearchMode::Latest,
            })
            .await;

        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Error collecting news"));
        assert!(outcome.message.contains("database is unavailable"), "{}", outcome.message);
        assert_eq!(outcome.stats.failed, 0);

        let runs = store.list_runs(10).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].message.as_deref(), Some(outcome.message.as_str()));
    }

    #[tokio::test]
    async fn test_run_reaped_mid_flight_is_reported_failed() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let client = ReapingSocial {
            store: &store,
            payload: search_payload(vec![tweet("1", "GPT news", "a")]),
        };
        let coordinator = Coordinator::new(&store, &client, &taxonomy, &platform);

        let outcome = coordinator
            .run(&UpdateRequest::QuerySearch {
                query: "q".into(),
                count: 1,
                mode: SearchMode::Latest,
            })
            .await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("marked abandoned"), "{}", outcome.message);
        assert_eq!(outcome.stats.processed, 1);

        let runs = store.list_runs(10).await.unwrap();
        assert_eq!(Some(runs[0].id), outcome.run_id);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].message.as_deref(), Some(ledger::ABANDONED_MESSAGE));
    }

    #[tokio::test]
    async fn test_cursor_entries_are_not_counted_as_unrecognized() {
        let taxonomy = Taxonomy::default();
        let platform = Platform::default();
        let store = store_with_taxonomy(&taxonomy).await;
        let ingestor = Ingestor::new(&store, &taxonomy, &platform);

        let mut payload = search_payload(vec![tweet("1", "hello", "a")]);
        let entries = payload["result"]["timeline"]["instructions"][0]["entries"]
            .as_array_mut()
            .unwrap();
        entries.push(json!({ "entryId": "cursor-top-1", "content": { "value": "t" } }));
        entries.push(json!({ "entryId": "cursor-bottom-1", "content": { "value": "b" } }));

        let stats = ingestor.ingest_payload(&payload).await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.dropped, 0);
        assert!(stats.summary().ends_with("0 unrecognized"));
    }
}
