//! Web search collaborator
//!
//! Single-shot request/response call against a Serper-style search API.
//! Results feed the optional web-context instruction; failures degrade
//! silently to no augmentation and never block the chat flow.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::{LyraError, Result};

/// Lower bound on the result count sent to the search API
pub const MIN_RESULTS: usize = 1;
/// Upper bound on the result count sent to the search API
pub const MAX_RESULTS: usize = 5;

/// One organic web search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Request body for the search API
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
}

/// Response body from the search API; only the organic list matters
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Clamp a requested result count into the supported range
pub fn clamp_result_count(requested: usize) -> usize {
    requested.clamp(MIN_RESULTS, MAX_RESULTS)
}

/// Client for the web search collaborator
#[derive(Debug)]
pub struct SearchClient {
    client: Client,
    config: SearchConfig,
    api_key: String,
}

impl SearchClient {
    /// Create a new search client from configuration
    ///
    /// Reads the API key from the environment variable named in the config;
    /// a missing key is a configuration error, surfaced before any stream
    /// output when augmentation is requested.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            LyraError::Config(format!("API key env var '{}' not set", config.api_key_env))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LyraError::Search(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    /// Search the web, best effort
    ///
    /// Any failure yields an empty list; augmentation failure never blocks
    /// the base chat flow.
    pub async fn search(&self, query: &str, max_docs: usize) -> Vec<SearchResult> {
        match self.try_search(query, max_docs).await {
            Ok(results) => results,
            Err(e) => {
                warn!("web search failed, continuing without context: {e}");
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query: &str, max_docs: usize) -> Result<Vec<SearchResult>> {
        let num = clamp_result_count(max_docs);
        debug!("Searching the web ({num} results) for: {query}");

        let response = self
            .client
            .post(&self.config.api_url)
            .header("X-API-KEY", &self.api_key)
            .json(&SearchRequest { q: query, num })
            .send()
            .await
            .map_err(|e| LyraError::Search(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LyraError::Search(format!("search API returned {status}")));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| LyraError::Search(format!("invalid search response: {e}")))?;

        Ok(parsed
            .organic
            .into_iter()
            .take(num)
            .map(|r| SearchResult {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
            })
            .collect())
    }
}
