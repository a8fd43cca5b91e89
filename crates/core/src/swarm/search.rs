//! # Web Search Capability
//!
//! Search-capable agents may run one web query before their main task.
//! Backed by SearXNG; the instance URL comes from `SEARXNG_URL` or falls
//! back to localhost.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Seam for the web-search capability; tests substitute scripted fakes.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// SearXNG-backed search client.
pub struct SearxSearch {
    http: reqwest::Client,
    endpoint: String,
}

impl SearxSearch {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/search", base.trim_end_matches('/')),
        }
    }

    /// Use `SEARXNG_URL` when set, else a local instance.
    pub fn from_env() -> Self {
        let base =
            std::env::var("SEARXNG_URL").unwrap_or_else(|_| "http://localhost:8888".to_string());
        Self::new(base)
    }
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[async_trait]
impl WebSearch for SearxSearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .context("search request failed")?;
        let parsed: SearxResponse = response
            .json()
            .await
            .context("search response was not valid JSON")?;
        Ok(parsed
            .results
            .into_iter()
            .take(max_results as usize)
            .collect())
    }
}

/// Format results as a context block for the agent's main prompt.
pub fn format_results(query: &str, results: &[SearchResult]) -> String {
    let mut block = format!("Web search results for \"{query}\":\n");
    for r in results {
        block.push_str(&format!("- {} ({})\n  {}\n", r.title, r.url, r.content));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_results() {
        let results = vec![SearchResult {
            title: "Spring physics".into(),
            url: "https://example.com".into(),
            content: "damping ratios".into(),
        }];
        let block = format_results("spring animation", &results);
        assert!(block.contains("spring animation"));
        assert!(block.contains("Spring physics"));
        assert!(block.contains("https://example.com"));
    }
}
