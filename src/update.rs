//! Ingestion run triggers.
//!
//! Both the `newsdesk update` commands and `POST /api/update` go through
//! [`trigger`], which runs one request inside the run ledger and always
//! returns an [`UpdateOutcome`].

use anyhow::{bail, Context, Result};
use newsdesk_core::pipeline::{Coordinator, IngestStats, UpdateOutcome, UpdateRequest};
use newsdesk_core::social::{SearchMode, SocialClient};
use newsdesk_core::store::Store;

use crate::config::Config;
use crate::social::HttpSocialClient;
use crate::sqlite_store::SqliteStore;

/// Runs `request` against `store` and `client` with the configured taxonomy.
pub async fn trigger(
    config: &Config,
    store: &dyn Store,
    client: &dyn SocialClient,
    request: &UpdateRequest,
) -> UpdateOutcome {
    let taxonomy = config.taxonomy();
    let platform = config.platform();
    let stale_after = match config.stale_after() {
        Ok(d) => d,
        Err(e) => {
            return UpdateOutcome {
                success: false,
                message: format!("Error updating news: {:#}", e),
                run_id: None,
                stats: IngestStats::default(),
            }
        }
    };

    tracing::info!(kind = %request.kind(), params = %request.params(), "Update triggered");
    let outcome = Coordinator::new(store, client, &taxonomy, &platform)
        .with_stale_after(stale_after)
        .run(request)
        .await;

    if outcome.success {
        tracing::info!(run_id = ?outcome.run_id, processed = outcome.stats.processed, "Update finished");
    } else {
        tracing::warn!(run_id = ?outcome.run_id, message = %outcome.message, "Update failed");
    }
    outcome
}

/// A query-search request, filling gaps from `[ingest]`.
pub fn search_request(
    config: &Config,
    query: Option<String>,
    count: Option<u32>,
    mode: SearchMode,
) -> UpdateRequest {
    UpdateRequest::QuerySearch {
        query: query
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| config.ingest.default_query.clone()),
        count: count
            .filter(|c| *c > 0)
            .unwrap_or(config.ingest.search_count),
        mode,
    }
}

/// An account-batch request, filling gaps from `[ingest]`.
pub fn accounts_request(
    config: &Config,
    accounts: Vec<String>,
    count_per_account: Option<u32>,
) -> UpdateRequest {
    let accounts: Vec<String> = accounts
        .into_iter()
        .map(|a| a.trim().trim_start_matches('@').to_string())
        .filter(|a| !a.is_empty())
        .collect();

    UpdateRequest::AccountBatch {
        accounts: if accounts.is_empty() {
            config.ingest.default_accounts.clone()
        } else {
            accounts
        },
        count_per_account: count_per_account
            .filter(|c| *c > 0)
            .unwrap_or(config.ingest.count_per_account),
    }
}

/// CLI entry point for `newsdesk update ...`.
///
/// Prints the outcome message and fails when the run did not succeed.
pub async fn run_update(config: &Config, request: UpdateRequest) -> Result<()> {
    let client = HttpSocialClient::from_config(&config.social)
        .context("Cannot build social API client")?;
    let store = SqliteStore::connect(config).await?;

    let outcome = trigger(config, &store, &client, &request).await;
    store.pool().close().await;

    println!("{}", outcome.message);
    if let Some(run_id) = outcome.run_id {
        println!("run {}", run_id);
    }

    if !outcome.success {
        bail!("update failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults() {
        let config = Config::with_db_path("x");
        let request = search_request(&config, None, None, SearchMode::Latest);
        assert_eq!(
            request,
            UpdateRequest::QuerySearch {
                query: "AI agent OR autonomous AI OR LLM agent".to_string(),
                count: 50,
                mode: SearchMode::Latest,
            }
        );

        let request = search_request(&config, Some("  ".into()), Some(0), SearchMode::Top);
        assert_eq!(request.params(), "AI agent OR autonomous AI OR LLM agent");
    }

    #[test]
    fn test_accounts_request_defaults_and_cleanup() {
        let config = Config::with_db_path("x");
        let request = accounts_request(&config, vec![], None);
        assert_eq!(request.params(), "OpenAI,AnthropicAI,DeepMind");

        let request = accounts_request(&config, vec!["@alice".into(), " ".into()], Some(3));
        assert_eq!(
            request,
            UpdateRequest::AccountBatch {
                accounts: vec!["alice".to_string()],
                count_per_account: 3,
            }
        );
    }
}
