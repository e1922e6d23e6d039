//! Read-side CLI commands: `news`, `show`, `tags`, `sources`, `runs`.

use anyhow::{bail, Result};
use newsdesk_core::models::{PostFilter, PostView};
use newsdesk_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub struct NewsArgs {
    pub tag: Option<String>,
    pub source: Option<String>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: Option<u32>,
}

impl NewsArgs {
    pub fn into_filter(self, config: &Config) -> PostFilter {
        PostFilter {
            tag: self.tag.filter(|t| !t.is_empty()),
            source: self.source.filter(|s| !s.is_empty()),
            search: self.search.filter(|s| !s.trim().is_empty()),
            page: self.page.max(1),
            limit: config.effective_limit(self.limit),
        }
    }
}

pub async fn run_news(config: &Config, args: NewsArgs) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let filter = args.into_filter(config);
    let posts = store.list_posts(&filter).await?;
    store.pool().close().await;

    if posts.is_empty() {
        println!("No posts.");
        return Ok(());
    }

    let first = filter.offset() + 1;
    for (i, post) in posts.iter().enumerate() {
        print_summary(first + i as u64, post);
    }
    Ok(())
}

fn print_summary(n: u64, post: &PostView) {
    let source = post
        .source
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or("(no source)");

    println!("{}. {} / {}", n, source, post.title.replace('\n', " "));
    println!("    published: {}", post.published_at);
    if !post.tags.is_empty() {
        let tags: Vec<&str> = post.tags.iter().map(|t| t.name.as_str()).collect();
        println!("    tags: {}", tags.join(", "));
    }
    println!("    url: {}", post.url);
    println!("    id: {}", post.id);
    println!();
}

pub async fn run_show(config: &Config, id: i64) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let post = store.get_post(id).await?;
    store.pool().close().await;

    let post = match post {
        Some(p) => p,
        None => bail!("post not found: {}", id),
    };

    println!("--- Post ---");
    println!("id:           {}", post.id);
    println!("external_id:  {}", post.external_id);
    println!("author:       {}", post.author);
    if let Some(ref source) = post.source {
        println!("source:       {} ({})", source.name, source.source_type);
        if let Some(ref url) = source.url {
            println!("source_url:   {}", url);
        }
    }
    println!("url:          {}", post.url);
    if let Some(ref image) = post.image_url {
        println!("image:        {}", image);
    }
    println!("published_at: {}", post.published_at);
    println!("created_at:   {}", post.created_at);
    let tags: Vec<&str> = post.tags.iter().map(|t| t.name.as_str()).collect();
    println!("tags:         {}", tags.join(", "));
    println!();

    println!("--- Content ---");
    println!("{}", post.content);

    Ok(())
}

pub async fn run_tags(config: &Config) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let tags = store.list_tags().await?;
    store.pool().close().await;

    if tags.is_empty() {
        println!("No tags. Run `newsdesk init` to seed them.");
        return Ok(());
    }
    println!("{:<6} NAME", "ID");
    for tag in &tags {
        println!("{:<6} {}", tag.id, tag.name);
    }
    Ok(())
}

pub async fn run_sources(config: &Config) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let sources = store.list_sources().await?;
    store.pool().close().await;

    if sources.is_empty() {
        println!("No sources.");
        return Ok(());
    }
    println!("{:<6} {:<24} {:<10} URL", "ID", "NAME", "TYPE");
    for source in &sources {
        println!(
            "{:<6} {:<24} {:<10} {}",
            source.id,
            source.name,
            source.source_type,
            source.url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn run_runs(config: &Config, limit: u32) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let runs = store.list_runs(limit).await?;
    store.pool().close().await;

    if runs.is_empty() {
        println!("No runs.");
        return Ok(());
    }
    println!(
        "{:<6} {:<14} {:<12} {:<21} MESSAGE",
        "ID", "TYPE", "STATUS", "STARTED"
    );
    for run in &runs {
        println!(
            "{:<6} {:<14} {:<12} {:<21} {}",
            run.id,
            run.kind.as_str(),
            run.status.as_str(),
            run.started_at,
            run.message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
