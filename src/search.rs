//! Live web search.
//!
//! Providers are tried in a fixed order — SerpAPI, then Tavily (each only
//! when its API key is configured), then the keyless DuckDuckGo JSON API.
//! The first provider returning results wins; individual failures are
//! collected and only surface when every provider fails.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const SNIPPET_MAX_CHARS: usize = 280;

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[async_trait]
trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSearchResult>, ApiError>;
}

/// Run `query` through the configured provider chain.
///
/// Errors only when every provider fails; the error message aggregates the
/// per-provider failure reasons for diagnostics.
pub async fn web_search(
    config: &Value,
    query: &str,
    limit: usize,
) -> Result<Vec<WebSearchResult>, ApiError> {
    let providers = build_providers(config);
    let mut failures = Vec::new();

    for provider in &providers {
        match provider.search(query, limit).await {
            Ok(results) if !results.is_empty() => {
                tracing::debug!(
                    "Web search via {} returned {} results",
                    provider.name(),
                    results.len()
                );
                return Ok(results);
            }
            Ok(_) => {
                failures.push(format!("{}: no results", provider.name()));
            }
            Err(err) => {
                tracing::warn!("Search provider {} failed: {}", provider.name(), err);
                failures.push(format!("{}: {}", provider.name(), err));
            }
        }
    }

    Err(ApiError::Internal(format!(
        "all search providers failed: {}",
        failures.join("; ")
    )))
}

fn build_providers(config: &Value) -> Vec<Box<dyn SearchProvider>> {
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default();

    let tools = config.get("tools");
    let read_key = |key: &str, env_var: &str| {
        tools
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| std::env::var(env_var).ok())
            .filter(|s| !s.is_empty())
    };

    let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();

    if let Some(api_key) = read_key("serpapi_api_key", "SERPAPI_API_KEY") {
        providers.push(Box::new(SerpApiProvider {
            api_key,
            client: client.clone(),
        }));
    }
    if let Some(api_key) = read_key("tavily_api_key", "TAVILY_API_KEY") {
        providers.push(Box::new(TavilyProvider {
            api_key,
            client: client.clone(),
        }));
    }
    providers.push(Box::new(DuckDuckGoProvider { client }));

    providers
}

struct SerpApiProvider {
    api_key: String,
    client: Client,
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSearchResult>, ApiError> {
        let url = format!(
            "https://serpapi.com/search.json?q={}&num={}&api_key={}",
            urlencoding::encode(query),
            limit,
            self.api_key
        );

        let response = self.client.get(url).send().await.map_err(ApiError::internal)?;
        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "SerpAPI search failed: {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(ApiError::internal)?;
        let items = payload
            .get("organic_results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for item in items.iter().take(limit) {
            let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let link = item.get("link").and_then(|v| v.as_str()).unwrap_or("");
            if title.is_empty() || link.is_empty() {
                continue;
            }
            results.push(WebSearchResult {
                title: title.to_string(),
                link: link.to_string(),
                snippet: truncate_snippet(
                    item.get("snippet").and_then(|v| v.as_str()).unwrap_or(""),
                ),
            });
        }

        Ok(results)
    }
}

struct TavilyProvider {
    api_key: String,
    client: Client,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSearchResult>, ApiError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": limit,
        });

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;
        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "Tavily search failed: {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(ApiError::internal)?;
        let items = payload
            .get("results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for item in items.iter().take(limit) {
            let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let link = item.get("url").and_then(|v| v.as_str()).unwrap_or("");
            if title.is_empty() || link.is_empty() {
                continue;
            }
            results.push(WebSearchResult {
                title: title.to_string(),
                link: link.to_string(),
                snippet: truncate_snippet(
                    item.get("content").and_then(|v| v.as_str()).unwrap_or(""),
                ),
            });
        }

        Ok(results)
    }
}

struct DuckDuckGoProvider {
    client: Client,
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSearchResult>, ApiError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );

        let response = self.client.get(url).send().await.map_err(ApiError::internal)?;
        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "DuckDuckGo search failed: {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(ApiError::internal)?;
        let mut results = Vec::new();

        if let Some(abstract_text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
            if let Some(link) = payload.get("AbstractURL").and_then(|v| v.as_str()) {
                if !abstract_text.is_empty() && !link.is_empty() {
                    results.push(WebSearchResult {
                        title: abstract_text
                            .split(" - ")
                            .next()
                            .unwrap_or(abstract_text)
                            .to_string(),
                        link: link.to_string(),
                        snippet: truncate_snippet(abstract_text),
                    });
                }
            }
        }

        if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut results);
        }
        if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut results);
        }

        results.truncate(limit);
        Ok(results)
    }
}

fn extract_ddg_topics(items: &[Value], results: &mut Vec<WebSearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let link = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || link.is_empty() {
            continue;
        }
        results.push(WebSearchResult {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            link: link.to_string(),
            snippet: truncate_snippet(text),
        });
    }
}

fn truncate_snippet(text: &str) -> String {
    text.chars().take(SNIPPET_MAX_CHARS).collect()
}
