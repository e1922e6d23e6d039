//! SQLite-backed [`Store`] implementation.
//!
//! Uniqueness is enforced by the schema (see [`crate::migrate`]); every
//! duplicate-prone write uses `ON CONFLICT DO NOTHING` / `INSERT OR IGNORE`
//! so races between concurrent runs resolve at the row level.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use newsdesk_core::models::{
    format_ts_iso, IngestionRun, NewPost, NewSource, PostFilter, PostView, RunKind, RunStatus,
    Source, Tag,
};
use newsdesk_core::store::Store;

use crate::config::Config;
use crate::db;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the configured database.
    pub async fn connect(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn tags_for(&self, post_id: i64) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name
            FROM tags t
            JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = ?
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn enrich(&self, rows: Vec<SqliteRow>) -> Result<Vec<PostView>> {
        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut post = post_from_row(row);
            post.tags = self.tags_for(post.id).await?;
            posts.push(post);
        }
        Ok(posts)
    }
}

const POST_COLUMNS: &str = r#"
    p.id, p.source_id, p.title, p.content, p.url, p.image_url, p.author,
    p.published_at, p.external_id, p.created_at, p.updated_at,
    s.name AS source_name, s.type AS source_type, s.url AS source_url,
    s.description AS source_description
"#;

fn post_from_row(row: &SqliteRow) -> PostView {
    let source_id: i64 = row.get("source_id");
    let source_name: Option<String> = row.get("source_name");
    let published_at: i64 = row.get("published_at");
    let created_at: i64 = row.get("created_at");
    let updated_at: i64 = row.get("updated_at");

    PostView {
        id: row.get("id"),
        source_id,
        title: row.get("title"),
        content: row.get("content"),
        url: row.get("url"),
        image_url: row.get("image_url"),
        author: row.get("author"),
        published_at: format_ts_iso(published_at),
        external_id: row.get("external_id"),
        created_at: format_ts_iso(created_at),
        updated_at: format_ts_iso(updated_at),
        tags: Vec::new(),
        source: source_name.map(|name| Source {
            id: source_id,
            name,
            source_type: row.get("source_type"),
            url: row.get("source_url"),
            description: row.get("source_description"),
        }),
    }
}

fn tag_from_row(row: &SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
    }
}

fn run_from_row(row: &SqliteRow) -> Result<IngestionRun> {
    let kind: String = row.get("type");
    let status: String = row.get("status");
    let started_at: i64 = row.get("started_at");
    let completed_at: Option<i64> = row.get("completed_at");

    Ok(IngestionRun {
        id: row.get("id"),
        kind: kind.parse::<RunKind>()?,
        params: row.get("params"),
        status: status.parse::<RunStatus>()?,
        message: row.get("message"),
        started_at: format_ts_iso(started_at),
        completed_at: completed_at.map(format_ts_iso),
    })
}

/// Escapes `%`, `_` and `\` so user text matches literally under `ESCAPE '\'`.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl Store for SqliteStore {
    async fn ensure_tags(&self, names: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for name in names {
            sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn post_exists(&self, external_id: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM posts WHERE external_id = ?")
                .bind(external_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Option<i64>> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (external_id, source_id, title, content, url, image_url,
                               author, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO NOTHING
            "#,
        )
        .bind(&post.external_id)
        .bind(post.source_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.url)
        .bind(&post.image_url)
        .bind(&post.author)
        .bind(post.published_at.timestamp())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(None)
        } else {
            Ok(Some(result.last_insert_rowid()))
        }
    }

    async fn get_or_create_source(&self, source: &NewSource) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sources (name, type, url, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name, type) DO NOTHING
            "#,
        )
        .bind(&source.name)
        .bind(&source.source_type)
        .bind(&source.url)
        .bind(&source.description)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM sources WHERE name = ? AND type = ?")
            .bind(&source.name)
            .bind(&source.source_type)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn tag_id(&self, name: &str) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn link_tag(&self, post_id: i64, tag_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn begin_run(
        &self,
        kind: RunKind,
        params: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO ingestion_runs (type, params, status, started_at) VALUES (?, ?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(params)
        .bind(RunStatus::InProgress.as_str())
        .bind(started_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn complete_run(
        &self,
        run_id: i64,
        status: RunStatus,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ingestion_runs
            SET status = ?, message = ?, completed_at = ?
            WHERE id = ? AND status = 'in_progress'
            "#,
        )
        .bind(status.as_str())
        .bind(message)
        .bind(completed_at.timestamp())
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn fail_stale_runs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE ingestion_runs
            SET status = 'failed', message = ?, completed_at = ?
            WHERE status = 'in_progress' AND started_at < ?
            "#,
        )
        .bind(message)
        .bind(completed_at.timestamp())
        .bind(cutoff.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<PostView>> {
        let mut sql = format!(
            "SELECT {} FROM posts p LEFT JOIN sources s ON s.id = p.source_id",
            POST_COLUMNS
        );
        let mut conditions: Vec<&str> = Vec::new();

        if filter.tag.is_some() {
            sql.push_str(
                " JOIN post_tags pt ON pt.post_id = p.id JOIN tags t ON t.id = pt.tag_id",
            );
            conditions.push("t.name = ?");
        }
        if filter.source.is_some() {
            conditions.push("s.name = ?");
        }
        if filter.search.is_some() {
            conditions.push(r"(p.title LIKE ? ESCAPE '\' OR p.content LIKE ? ESCAPE '\')");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY p.published_at DESC, p.id DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(tag) = &filter.tag {
            query = query.bind(tag);
        }
        if let Some(source) = &filter.source {
            query = query.bind(source);
        }
        if let Some(search) = &filter.search {
            let pattern = like_pattern(search);
            query = query.bind(pattern.clone()).bind(pattern);
        }
        let rows = query
            .bind(i64::from(filter.limit))
            .bind(filter.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        self.enrich(rows).await
    }

    async fn get_post(&self, id: i64) -> Result<Option<PostView>> {
        let sql = format!(
            "SELECT {} FROM posts p LEFT JOIN sources s ON s.id = p.source_id WHERE p.id = ?",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.enrich(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT id, name, type, url, description FROM sources ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| Source {
                id: row.get("id"),
                name: row.get("name"),
                source_type: row.get("type"),
                url: row.get("url"),
                description: row.get("description"),
            })
            .collect())
    }

    async fn list_runs(&self, limit: u32) -> Result<Vec<IngestionRun>> {
        let rows = sqlx::query(
            r#"
            SELECT id, type, params, status, message, started_at, completed_at
            FROM ingestion_runs
            ORDER BY started_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_from_row).collect()
    }
}
