//! Information Source Gateway
//!
//! Uniform capability over the external content APIs a persona may
//! consult mid-cycle. Dispatch is by keyword inspection of the free-text
//! query; every outcome crosses the boundary as a result mapping, never
//! as an error:
//!
//! - `{"weather": <text>}` / `{"bilibili": <payload>}` on success
//! - `{"error": <message>}` when the source fails or times out
//! - `{"info": "no_api"}` when no source recognizes the query
//!
//! A degraded lookup is data for the next cycle's prompt, not a cycle
//! failure.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::bilibili::BilibiliClient;
use crate::config::Config;

/// Lookup seam the tracker depends on. `SourceGateway` is the production
/// implementation; tests inject deterministic stand-ins.
#[async_trait]
pub trait InfoLookup: Send + Sync {
    /// Resolve a free-text query into a result mapping. Infallible by
    /// contract: failures are folded into the mapping.
    async fn lookup(&self, query: &str) -> Map<String, Value>;
}

/// A pluggable external information source
#[async_trait]
pub trait InfoSource: Send + Sync {
    /// Key the payload is stored under in the result mapping.
    fn name(&self) -> &str;

    /// Whether this source recognizes the query.
    fn matches(&self, query: &str) -> bool;

    /// Fetch the payload. Transport and format errors propagate to the
    /// gateway, which folds them.
    async fn fetch(&self, query: &str) -> Result<Value>;
}

/// Keyword-dispatching gateway over the registered sources
pub struct SourceGateway {
    sources: Vec<Box<dyn InfoSource>>,
    timeout: Duration,
}

impl SourceGateway {
    /// Gateway with the standard sources (weather, bilibili).
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            vec![
                Box::new(WeatherSource::new(config.lookup_timeout)),
                Box::new(BilibiliSource::new(BilibiliClient::new(config.lookup_timeout))),
            ],
            config.lookup_timeout,
        )
    }

    pub fn new(sources: Vec<Box<dyn InfoSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }
}

#[async_trait]
impl InfoLookup for SourceGateway {
    async fn lookup(&self, query: &str) -> Map<String, Value> {
        let mut result = Map::new();

        let Some(source) = self.sources.iter().find(|s| s.matches(query)) else {
            debug!("No source matches query: {}", query);
            result.insert("info".to_string(), Value::String("no_api".to_string()));
            return result;
        };

        debug!("Dispatching query to source '{}': {}", source.name(), query);

        match tokio::time::timeout(self.timeout, source.fetch(query)).await {
            Ok(Ok(payload)) => {
                result.insert(source.name().to_string(), payload);
            }
            Ok(Err(e)) => {
                warn!("Source '{}' failed: {}", source.name(), e);
                result.insert("error".to_string(), Value::String(e.to_string()));
            }
            Err(_) => {
                warn!("Source '{}' timed out after {:?}", source.name(), self.timeout);
                result.insert(
                    "error".to_string(),
                    Value::String(format!("{} lookup timed out", source.name())),
                );
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// Weather (wttr.in)
// ---------------------------------------------------------------------------

/// Free-text weather via wttr.in
pub struct WeatherSource {
    client: Client,
    base_url: String,
}

impl WeatherSource {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url("https://wttr.in", timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.to_string(),
        }
    }

    /// Strip the trigger keywords, leaving the location.
    fn location(query: &str) -> String {
        let lower = query.to_lowercase();
        let mut loc = lower.replace("weather", "");
        loc = loc.replace("天气", "");
        loc.trim().to_string()
    }
}

#[async_trait]
impl InfoSource for WeatherSource {
    fn name(&self) -> &str {
        "weather"
    }

    fn matches(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        lower.contains("weather") || lower.contains("天气")
    }

    async fn fetch(&self, query: &str) -> Result<Value> {
        let url = format!("{}/{}?format=j1", self.base_url, Self::location(query));
        let body: Value = self.client.get(&url).send().await?.error_for_status()?.json().await?;

        let temp = body
            .get("current_condition")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("temp_C"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow::anyhow!("wttr.in response missing current_condition"))?;

        Ok(Value::String(format!("{}°C", temp)))
    }
}

// ---------------------------------------------------------------------------
// Bilibili
// ---------------------------------------------------------------------------

/// Bilibili content lookups (ranking, search, random popular video)
pub struct BilibiliSource {
    client: BilibiliClient,
}

impl BilibiliSource {
    pub fn new(client: BilibiliClient) -> Self {
        Self { client }
    }

    /// Keyword left after removing the trigger words, if any.
    fn search_term(query: &str) -> Option<String> {
        let lower = query.to_lowercase();
        let stripped = lower
            .replace("bilibili", "")
            .replace("b站", "")
            .trim()
            .to_string();
        if stripped.is_empty() {
            None
        } else {
            Some(stripped)
        }
    }
}

#[async_trait]
impl InfoSource for BilibiliSource {
    fn name(&self) -> &str {
        "bilibili"
    }

    fn matches(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        lower.contains("bilibili") || lower.contains("b站")
    }

    async fn fetch(&self, query: &str) -> Result<Value> {
        let lower = query.to_lowercase();

        if lower.contains("rank") || lower.contains("排行") {
            let entries = self.client.ranking(0, "all").await?;
            return Ok(Value::Array(entries.into_iter().take(5).collect()));
        }

        if let Some(term) = Self::search_term(query) {
            let hits = self.client.search_videos(&term, 1).await?;
            if !hits.is_empty() {
                return Ok(Value::Array(hits.into_iter().take(5).collect()));
            }
        }

        match self.client.random_video().await? {
            Some(video) => Ok(video),
            None => Ok(Value::Null),
        }
    }
}
