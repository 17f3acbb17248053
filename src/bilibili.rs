//! Bilibili Web API Client
//!
//! Read-only client for the public bilibili.com web endpoints used to
//! enrich persona memory: hot ranking, popular feed, keyword search and
//! partition listings. All calls are bounded by the configured timeout
//! and tolerate shape drift in the response body (missing lists come back
//! empty rather than erroring).

use anyhow::Result;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://api.bilibili.com";

/// Client for bilibili web-interface endpoints
#[derive(Clone)]
pub struct BilibiliClient {
    client: Client,
    base_url: String,
}

impl BilibiliClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(BASE_URL, timeout)
    }

    /// Point the client at a different host (used by tests).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.to_string(),
        }
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Bilibili request: {} params={:?}", url, params);

        let response = self.client.get(&url).query(params).send().await?;
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch the ranking list. `rid` 0 means overall; `kind` is the
    /// ranking type ("all", "origin", "rookie").
    pub async fn ranking(&self, rid: u32, kind: &str) -> Result<Vec<Value>> {
        let data = self
            .get_json(
                "/x/web-interface/ranking/v2",
                &[("rid", rid.to_string()), ("type", kind.to_string())],
            )
            .await?;
        Ok(extract_list(&data, "list"))
    }

    /// Fetch a page of the popular feed.
    pub async fn popular(&self, ps: u32, pn: u32) -> Result<Vec<Value>> {
        let data = self
            .get_json(
                "/x/web-interface/popular",
                &[("ps", ps.to_string()), ("pn", pn.to_string())],
            )
            .await?;
        Ok(extract_list(&data, "list"))
    }

    /// Pick a random video from the first popular page.
    pub async fn random_video(&self) -> Result<Option<Value>> {
        let items = self.popular(20, 1).await?;
        Ok(items.choose(&mut rand::thread_rng()).cloned())
    }

    /// Search videos by keyword.
    pub async fn search_videos(&self, keyword: &str, page: u32) -> Result<Vec<Value>> {
        let data = self
            .get_json(
                "/x/web-interface/search/type",
                &[
                    ("search_type", "video".to_string()),
                    ("keyword", keyword.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;
        Ok(extract_list(&data, "result"))
    }

    /// Fetch the newest videos from a specific partition.
    pub async fn partition(&self, rid: u32, page: u32, ps: u32) -> Result<Vec<Value>> {
        let data = self
            .get_json(
                "/x/web-interface/newlist",
                &[
                    ("rid", rid.to_string()),
                    ("pn", page.to_string()),
                    ("ps", ps.to_string()),
                ],
            )
            .await?;
        Ok(extract_list(&data, "archives"))
    }
}

/// Pull `data.<key>` out of a response body, empty when absent.
fn extract_list(body: &Value, key: &str) -> Vec<Value> {
    body.get("data")
        .and_then(|d| d.get(key))
        .and_then(|l| l.as_array())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_list_present() {
        let body = json!({"code": 0, "data": {"list": [{"title": "a"}, {"title": "b"}]}});
        assert_eq!(extract_list(&body, "list").len(), 2);
    }

    #[test]
    fn test_extract_list_missing_is_empty() {
        assert!(extract_list(&json!({"code": 0}), "list").is_empty());
        assert!(extract_list(&json!({"data": {}}), "archives").is_empty());
        assert!(extract_list(&json!({"data": {"list": "oops"}}), "list").is_empty());
    }
}
