use anyhow::{Context, Result};
use chrono::Duration;
use newsdesk_core::classify::Taxonomy;
use newsdesk_core::social::Platform;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub social: SocialConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Tag name → keywords. Replaces the built-in taxonomy when present.
    #[serde(default)]
    pub taxonomy: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SocialConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_profile_base_url")]
    pub profile_base_url: String,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            platform: default_platform(),
            profile_base_url: default_profile_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://twitter-api45.p.rapidapi.com".to_string()
}
fn default_api_key_env() -> String {
    "SOCIAL_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_platform() -> String {
    "twitter".to_string()
}
fn default_profile_base_url() -> String {
    "https://twitter.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_query")]
    pub default_query: String,
    #[serde(default = "default_search_count")]
    pub search_count: u32,
    #[serde(default = "default_accounts")]
    pub default_accounts: Vec<String>,
    #[serde(default = "default_count_per_account")]
    pub count_per_account: u32,
    #[serde(default = "default_stale_run_minutes")]
    pub stale_run_minutes: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_query: default_query(),
            search_count: default_search_count(),
            default_accounts: default_accounts(),
            count_per_account: default_count_per_account(),
            stale_run_minutes: default_stale_run_minutes(),
        }
    }
}

fn default_query() -> String {
    "AI agent OR autonomous AI OR LLM agent".to_string()
}
fn default_search_count() -> u32 {
    50
}
fn default_accounts() -> Vec<String> {
    vec![
        "OpenAI".to_string(),
        "AnthropicAI".to_string(),
        "DeepMind".to_string(),
    ]
}
fn default_count_per_account() -> u32 {
    10
}
fn default_stale_run_minutes() -> i64 {
    60
}

/// One hundred years.
const MAX_STALE_RUN_MINUTES: i64 = 525_600 * 100;

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> u32 {
    12
}
fn default_max_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Config {
    /// A config with every default and the given database path.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: path.into(),
                max_connections: default_max_connections(),
                busy_timeout_secs: default_busy_timeout_secs(),
            },
            social: SocialConfig::default(),
            ingest: IngestConfig::default(),
            query: QueryConfig::default(),
            server: ServerConfig::default(),
            taxonomy: None,
        }
    }

    pub fn taxonomy(&self) -> Taxonomy {
        match &self.taxonomy {
            Some(tags) => Taxonomy::new(tags.clone()),
            None => Taxonomy::default(),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform::new(&self.social.platform, &self.social.profile_base_url)
    }

    pub fn stale_after(&self) -> Result<Duration> {
        Duration::try_minutes(self.ingest.stale_run_minutes).with_context(|| {
            format!(
                "ingest.stale_run_minutes out of range: {}",
                self.ingest.stale_run_minutes
            )
        })
    }

    /// Clamps a requested page size into `1..=max_limit`, defaulting when absent.
    pub fn effective_limit(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(0) | None => self.query.default_limit,
            Some(n) => n.min(self.query.max_limit),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be > 0");
    }

    if config.ingest.search_count == 0 {
        anyhow::bail!("ingest.search_count must be > 0");
    }
    if config.ingest.count_per_account == 0 {
        anyhow::bail!("ingest.count_per_account must be > 0");
    }
    if config.ingest.stale_run_minutes <= 0
        || config.ingest.stale_run_minutes > MAX_STALE_RUN_MINUTES
    {
        anyhow::bail!(
            "ingest.stale_run_minutes must be between 1 and {}",
            MAX_STALE_RUN_MINUTES
        );
    }
    if config.ingest.default_query.trim().is_empty() {
        anyhow::bail!("ingest.default_query must not be empty");
    }

    if config.query.default_limit == 0 || config.query.max_limit == 0 {
        anyhow::bail!("query.default_limit and query.max_limit must be > 0");
    }
    if config.query.default_limit > config.query.max_limit {
        anyhow::bail!(
            "query.default_limit ({}) must be <= query.max_limit ({})",
            config.query.default_limit,
            config.query.max_limit
        );
    }

    if config.social.timeout_secs == 0 {
        anyhow::bail!("social.timeout_secs must be > 0");
    }
    if config.social.platform.trim().is_empty() {
        anyhow::bail!("social.platform must not be empty");
    }

    if let Some(tags) = &config.taxonomy {
        for (tag, keywords) in tags {
            if keywords.is_empty() {
                anyhow::bail!("taxonomy.\"{}\" must list at least one keyword", tag);
            }
            if keywords.iter().any(|k| k.trim().is_empty()) {
                anyhow::bail!("taxonomy.\"{}\" contains an empty keyword", tag);
            }
        }
    }

    Ok(())
}
