//! Evidence source abstraction and web-search implementations.
//!
//! Every evidence source exposes the same `search(query, options)` contract
//! and the same degraded-failure behavior: missing credentials or any
//! network/API fault produce an empty `found = false` result instead of an
//! error. The orchestrator can always proceed with whatever evidence it
//! collected. The failure-absorption path lives in one place,
//! [`search_absorbed`], so it is implemented and tested once.
//!
//! Two implementations are provided:
//! - **[`SerpSearch`]** — SERP-API web search, optionally scoped to an
//!   allow-list of trusted domains via `site:` operators. This is the
//!   high-precision source the orchestrator uses as its mandatory final check.
//! - **[`NeuralSearch`]** — general neural web search for broader coverage.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::config::EvidenceConfig;
use crate::models::{EvidenceItem, EvidenceResult};

/// Options for one evidence search.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Restrict results to these domains. Empty means unscoped; non-empty
    /// also enables official tagging on every returned item.
    pub domains: Vec<String>,
    /// Requested result count.
    pub count: usize,
}

/// A pluggable, independently failing provider of corroborating or
/// contradicting information for a claim.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Short identifier used in `sources_checked` and logs.
    fn name(&self) -> &str;

    /// Run one search. Implementations must be bounded in time (fail fast)
    /// and should return `Ok` with an empty result when unconfigured; raw
    /// transport errors are acceptable here because [`search_absorbed`]
    /// absorbs them.
    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<EvidenceResult>;
}

/// Uniform failure-absorption wrapper around [`EvidenceSource::search`].
///
/// Any error becomes an empty result attributed to the source, logged as a
/// warning. This is the only call path the orchestrator uses.
pub async fn search_absorbed(
    source: &dyn EvidenceSource,
    query: &str,
    opts: &SearchOptions,
) -> EvidenceResult {
    match source.search(query, opts).await {
        Ok(result) => result,
        Err(err) => {
            warn!(source = source.name(), %err, "evidence source failed, degrading to empty result");
            EvidenceResult::empty(source.name())
        }
    }
}

/// Whether `url_str`'s host belongs to the trusted-domain set
/// (exact match or dot-suffix match).
pub fn is_official(url_str: &str, domains: &[String]) -> bool {
    let host = match Url::parse(url_str) {
        Ok(u) => match u.host_str() {
            Some(h) => h.to_lowercase(),
            None => return false,
        },
        Err(_) => return false,
    };

    domains.iter().any(|d| {
        let d = d.to_lowercase();
        host == d || host.ends_with(&format!(".{}", d))
    })
}

/// Tag every item's `official` flag when domain scoping was requested.
pub fn tag_official(items: &mut [EvidenceItem], domains: &[String]) {
    if domains.is_empty() {
        return;
    }
    for item in items {
        item.official = Some(is_official(&item.url, domains));
    }
}

/// Append `site:` operators for a domain allow-list.
fn build_scoped_query(query: &str, domains: &[String]) -> String {
    if domains.is_empty() {
        return query.to_string();
    }
    let sites: Vec<String> = domains.iter().map(|d| format!("site:{}", d)).collect();
    format!("{} ({})", query, sites.join(" OR "))
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

// ============ SERP web search ============

/// Web search via a SERP API (serper.dev-compatible).
///
/// With a domain allow-list in the options, the query is scoped with `site:`
/// operators, making this the high-precision official-source check.
pub struct SerpSearch {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl SerpSearch {
    pub fn new(config: &EvidenceConfig) -> Result<Self> {
        Ok(Self {
            api_key: config.serp_api_key.clone(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EvidenceSource for SerpSearch {
    fn name(&self) -> &str {
        "web-search"
    }

    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<EvidenceResult> {
        // Missing configuration is source-local and non-fatal.
        let api_key = match &self.api_key {
            Some(key) => key,
            None => return Ok(EvidenceResult::empty(self.name())),
        };

        let scoped = build_scoped_query(query, &opts.domains);
        let response = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", api_key)
            .json(&serde_json::json!({ "q": scoped, "num": opts.count.max(1) }))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("SERP API returned HTTP {}", response.status());
        }

        let body: Value = response.json().await?;
        let mut items = parse_serp_results(&body, opts.count);
        tag_official(&mut items, &opts.domains);

        let mut result = EvidenceResult::empty(self.name());
        for domain in &opts.domains {
            result.sources_checked.insert(domain.clone());
        }
        result.found = !items.is_empty();
        result.items = items;
        Ok(result)
    }
}

fn parse_serp_results(body: &Value, count: usize) -> Vec<EvidenceItem> {
    body["organic"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .take(count.max(1))
                .filter_map(|entry| {
                    let url = entry["link"].as_str()?;
                    Some(EvidenceItem {
                        title: entry["title"].as_str().unwrap_or("(untitled)").to_string(),
                        url: url.to_string(),
                        excerpt: entry["snippet"].as_str().unwrap_or("").to_string(),
                        published_date: entry["date"].as_str().map(|s| s.to_string()),
                        official: None,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

// ============ Neural web search ============

/// General neural web search (exa.ai-compatible).
pub struct NeuralSearch {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl NeuralSearch {
    pub fn new(config: &EvidenceConfig) -> Result<Self> {
        Ok(Self {
            api_key: config.neural_api_key.clone(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EvidenceSource for NeuralSearch {
    fn name(&self) -> &str {
        "neural-search"
    }

    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<EvidenceResult> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => return Ok(EvidenceResult::empty(self.name())),
        };

        let mut payload = serde_json::json!({
            "query": query,
            "numResults": opts.count.max(1),
            "contents": { "text": { "maxCharacters": 500 } },
        });
        if !opts.domains.is_empty() {
            payload["includeDomains"] = serde_json::json!(opts.domains);
        }

        let response = self
            .client
            .post("https://api.exa.ai/search")
            .header("x-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("neural search API returned HTTP {}", response.status());
        }

        let body: Value = response.json().await?;
        let mut items = parse_neural_results(&body, opts.count);
        tag_official(&mut items, &opts.domains);

        let mut result = EvidenceResult::empty(self.name());
        result.found = !items.is_empty();
        result.items = items;
        Ok(result)
    }
}

fn parse_neural_results(body: &Value, count: usize) -> Vec<EvidenceItem> {
    body["results"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .take(count.max(1))
                .filter_map(|entry| {
                    let url = entry["url"].as_str()?;
                    Some(EvidenceItem {
                        title: entry["title"].as_str().unwrap_or("(untitled)").to_string(),
                        url: url.to_string(),
                        excerpt: entry["text"].as_str().unwrap_or("").to_string(),
                        published_date: entry["publishedDate"].as_str().map(|s| s.to_string()),
                        official: None,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
