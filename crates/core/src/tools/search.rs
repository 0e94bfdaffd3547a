//! # Search
//!
//! Web search collaborator. Best-effort: callers treat any error as
//! "no augmentation available" and carry on.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Snippet or extracted page text
    pub text: String,
}

/// Search results for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub source: String,
    pub results: Vec<SearchResult>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse>;
}

/// SearXNG-backed search, trying each configured endpoint in turn
pub struct SearxngSearch {
    client: reqwest::Client,
    endpoints: Vec<String>,
    max_results: usize,
}

impl SearxngSearch {
    /// Build the endpoint list:
    /// 1. explicitly configured instance (or `SEARXNG_URL`)
    /// 2. public instances
    /// 3. local fallback
    pub fn new(custom_url: Option<&str>) -> Self {
        let mut endpoints: Vec<String> = Vec::new();

        let configured = custom_url
            .map(str::to_string)
            .or_else(|| std::env::var("SEARXNG_URL").ok());
        if let Some(url) = configured {
            endpoints.push(format!("{}/search", url.trim_end_matches('/')));
        }

        // Full list: https://searx.space/
        endpoints.extend([
            "https://searx.be/search".to_string(),
            "https://search.sapti.me/search".to_string(),
        ]);

        endpoints.push("http://localhost:8888/search".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoints,
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

/// Pull title/url/content out of a SearXNG JSON payload
fn parse_searxng(json: &serde_json::Value, max_results: usize) -> Option<Vec<SearchResult>> {
    let results = json.get("results")?.as_array()?;
    Some(
        results
            .iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r.get("title").and_then(|t| t.as_str()).unwrap_or("").to_string(),
                url: r.get("url").and_then(|u| u.as_str()).unwrap_or("").to_string(),
                text: r.get("content").and_then(|c| c.as_str()).unwrap_or("").to_string(),
            })
            .collect(),
    )
}

#[async_trait]
impl WebSearch for SearxngSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        for endpoint in &self.endpoints {
            let url = format!("{}?q={}&format=json", endpoint, urlencoding::encode(query));

            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("search endpoint {} unreachable: {}", endpoint, e);
                    continue;
                }
            };
            if let Ok(json) = response.json::<serde_json::Value>().await {
                if let Some(results) = parse_searxng(&json, self.max_results) {
                    return Ok(SearchResponse {
                        query: query.to_string(),
                        source: "searxng".to_string(),
                        results,
                    });
                }
            }
        }

        anyhow::bail!("No search backend available for query '{}'", query)
    }
}
