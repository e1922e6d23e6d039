//! # newsdesk CLI
//!
//! ```bash
//! newsdesk --config ./config/newsdesk.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `newsdesk init` | Create the SQLite database and seed tags |
//! | `newsdesk update search` | Ingest one page of search results |
//! | `newsdesk update accounts` | Ingest recent posts from a list of accounts |
//! | `newsdesk news` | List stored posts |
//! | `newsdesk show <id>` | Print one post |
//! | `newsdesk tags` / `sources` / `runs` | List tags, sources, or recent runs |
//! | `newsdesk serve` | Start the HTTP API |
//!
//! Logs go to stderr; set `RUST_LOG` to change verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use newsdesk::{config, migrate, news, server, update};
use newsdesk_core::social::SearchMode;

/// newsdesk: collect, tag, and browse AI news from social media.
#[derive(Parser)]
#[command(name = "newsdesk", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/newsdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and seed tags.
    ///
    /// Idempotent: running it again changes nothing.
    Init,

    /// Trigger an ingestion run.
    Update {
        #[command(subcommand)]
        target: UpdateTarget,
    },

    /// List stored posts, newest first.
    News {
        /// Only posts with this tag.
        #[arg(long)]
        tag: Option<String>,

        /// Only posts from this source name.
        #[arg(long)]
        source: Option<String>,

        /// Substring match on title or content.
        #[arg(long)]
        search: Option<String>,

        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size (defaults to `[query].default_limit`).
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Print one post with its tags and source.
    Show {
        /// Post id.
        id: i64,
    },

    /// List tags.
    Tags,

    /// List sources.
    Sources,

    /// List recent ingestion runs.
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum UpdateTarget {
    /// Ingest one page of search results.
    Search {
        /// Search query (defaults to `[ingest].default_query`).
        #[arg(long)]
        query: Option<String>,

        /// Results to request (defaults to `[ingest].search_count`).
        #[arg(long)]
        count: Option<u32>,

        /// Result ordering: `latest` or `top`.
        #[arg(long, default_value = "latest")]
        mode: SearchMode,
    },

    /// Ingest recent posts from each account.
    Accounts {
        /// Account handle; repeat for several (defaults to `[ingest].default_accounts`).
        #[arg(long = "account")]
        accounts: Vec<String>,

        /// Posts per account (defaults to `[ingest].count_per_account`).
        #[arg(long)]
        count: Option<u32>,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsdesk=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Update { target } => {
            let request = match target {
                UpdateTarget::Search { query, count, mode } => {
                    update::search_request(&cfg, query, count, mode)
                }
                UpdateTarget::Accounts { accounts, count } => {
                    update::accounts_request(&cfg, accounts, count)
                }
            };
            update::run_update(&cfg, request).await?;
        }
        Commands::News {
            tag,
            source,
            search,
            page,
            limit,
        } => {
            news::run_news(
                &cfg,
                news::NewsArgs {
                    tag,
                    source,
                    search,
                    page,
                    limit,
                },
            )
            .await?;
        }
        Commands::Show { id } => {
            news::run_show(&cfg, id).await?;
        }
        Commands::Tags => {
            news::run_tags(&cfg).await?;
        }
        Commands::Sources => {
            news::run_sources(&cfg).await?;
        }
        Commands::Runs { limit } => {
            news::run_runs(&cfg, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
