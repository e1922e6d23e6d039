//! HTTP client for the social platform's search and timeline API.
//!
//! Implements [`SocialClient`] over a RapidAPI-style JSON gateway:
//!
//! | Call | Request |
//! |------|---------|
//! | search | `GET {base}/search?query=..&count=..&type=Latest\|Top` |
//! | profile | `GET {base}/user?username=..` |
//! | timeline | `GET {base}/user-tweets?user=..&count=..` |
//!
//! The API key is read from the environment variable named by
//! `[social].api_key_env` and sent as `x-api-key`.

use std::time::Duration;

use async_trait::async_trait;
use newsdesk_core::social::{SearchMode, SocialClient};
use serde_json::Value;
use thiserror::Error;

use crate::config::SocialConfig;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),
}

impl From<reqwest::Error> for SocialError {
    fn from(err: reqwest::Error) -> Self {
        SocialError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SocialError {
    fn from(err: serde_json::Error) -> Self {
        SocialError::Parse(err.to_string())
    }
}

pub struct HttpSocialClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpSocialClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SocialError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Builds a client from config, reading the API key from the environment.
    pub fn from_config(config: &SocialConfig) -> Result<Self, SocialError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SocialError::MissingCredentials(config.api_key_env.clone()))?;

        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, SocialError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(url = %url, "Social API request");

        let resp = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SocialError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl SocialClient for HttpSocialClient {
    async fn search(&self, query: &str, count: u32, mode: SearchMode) -> anyhow::Result<Value> {
        let params = [
            ("query", query.to_string()),
            ("count", count.to_string()),
            ("type", mode.as_str().to_string()),
        ];
        Ok(self.get_json("search", &params).await?)
    }

    async fn get_profile(&self, handle: &str) -> anyhow::Result<Value> {
        Ok(self
            .get_json("user", &[("username", handle.to_string())])
            .await?)
    }

    async fn get_timeline(&self, user_id: &str, count: u32) -> anyhow::Result<Value> {
        let params = [("user", user_id.to_string()), ("count", count.to_string())];
        Ok(self.get_json("user-tweets", &params).await?)
    }
}
