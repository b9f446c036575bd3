//! Content-enrichment provider client.
//!
//! Fetches richer post content (body, recent replies) through an actor-run
//! endpoint. Every failure mode (missing token, transport error, non-2xx,
//! empty result) collapses to `None`: enrichment is best-effort and must
//! never abort a synchronization pass.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.apify.com";
const DEFAULT_ACTOR: &str = "apify~reddit-scraper-lite";
const MAX_COMMENTS: u32 = 20;

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub token: Option<String>,
    pub actor: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl EnrichmentConfig {
    pub fn from_env() -> Self {
        Self {
            token: std::env::var("APIFY_TOKEN").ok(),
            actor: std::env::var("APIFY_ACTOR").unwrap_or_else(|_| DEFAULT_ACTOR.to_string()),
            base_url: std::env::var("APIFY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("REDRANK_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
            ),
        }
    }
}

#[async_trait]
pub trait EnrichmentFetcher: Send + Sync {
    /// Fetch an opaque enrichment payload for one post URL, optionally
    /// including recent replies. Infallible by contract.
    async fn fetch(&self, url: &str, include_comments: bool) -> Option<Value>;
}

#[derive(Debug)]
pub struct ActorEnrichmentClient {
    http: reqwest::Client,
    config: EnrichmentConfig,
}

impl ActorEnrichmentClient {
    pub fn new(config: EnrichmentConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl EnrichmentFetcher for ActorEnrichmentClient {
    async fn fetch(&self, url: &str, include_comments: bool) -> Option<Value> {
        let Some(token) = &self.config.token else {
            debug!("no enrichment token configured, skipping");
            return None;
        };

        let endpoint = format!(
            "{}/v2/acts/{}/run-sync-get-dataset-items",
            self.config.base_url, self.config.actor
        );

        // Fixed request shape; only the comments flag varies per call.
        let body = serde_json::json!({
            "startUrls": [{ "url": url }],
            "maxItems": 1,
            "maxPostCount": 1,
            "maxComments": if include_comments { MAX_COMMENTS } else { 0 },
            "includeComments": include_comments,
            "sort": "new",
            "proxy": { "useApifyProxy": true },
        });

        let response = match self
            .http
            .post(&endpoint)
            .query(&[("token", token.as_str())])
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "enrichment request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(url, status = response.status().as_u16(), "enrichment rejected");
            return None;
        }

        match response.json::<Value>().await {
            Ok(value) => first_item(value),
            Err(e) => {
                warn!(url, error = %e, "enrichment response was not json");
                None
            }
        }
    }
}

/// The dataset endpoint returns either an array of scraped items (first
/// element used) or a single object. Empty array means nothing scraped.
fn first_item(value: Value) -> Option<Value> {
    match value {
        Value::Array(mut items) => {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        }
        Value::Null => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_response_yields_first_element() {
        let value = json!([{"title": "a"}, {"title": "b"}]);
        assert_eq!(first_item(value), Some(json!({"title": "a"})));
    }

    #[test]
    fn empty_array_and_null_yield_nothing() {
        assert_eq!(first_item(json!([])), None);
        assert_eq!(first_item(Value::Null), None);
    }

    #[test]
    fn lone_object_passes_through() {
        let value = json!({"title": "solo"});
        assert_eq!(first_item(value.clone()), Some(value));
    }

    #[tokio::test]
    async fn missing_token_yields_none_without_any_request() {
        let client = ActorEnrichmentClient::new(EnrichmentConfig {
            token: None,
            actor: DEFAULT_ACTOR.to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert!(client
            .fetch("https://www.reddit.com/r/running/comments/a/", true)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn unreachable_provider_yields_none_not_error() {
        let client = ActorEnrichmentClient::new(EnrichmentConfig {
            token: Some("t".to_string()),
            actor: DEFAULT_ACTOR.to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert!(client
            .fetch("https://www.reddit.com/r/running/comments/a/", false)
            .await
            .is_none());
    }
}
