//! Search-results provider client.
//!
//! One live request per keyword against the provider's first-page organic
//! endpoint. The provider wraps the real outcome in a task envelope, so a
//! 200 transport response can still carry a failed task; both layers are
//! checked here.

use std::time::Duration;

use async_trait::async_trait;
use redrank_core::{RankCandidate, SyncError};
use serde::Deserialize;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.dataforseo.com";
const SERP_ENDPOINT: &str = "/v3/serp/google/organic/live/advanced";
const TARGET_DOMAIN: &str = "reddit.com";

/// Provider-level code for a completed task.
const TASK_OK: i64 = 20000;

#[derive(Debug, Clone)]
pub struct SerpConfig {
    pub login: Option<String>,
    pub password: Option<String>,
    pub base_url: String,
    pub location_code: u32,
    pub language_code: String,
    pub timeout: Duration,
}

impl SerpConfig {
    pub fn from_env() -> Self {
        Self {
            login: std::env::var("DATAFORSEO_LOGIN").ok(),
            password: std::env::var("DATAFORSEO_PASSWORD").ok(),
            base_url: std::env::var("DATAFORSEO_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            location_code: std::env::var("REDRANK_LOCATION_CODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2840),
            language_code: std::env::var("REDRANK_LANGUAGE_CODE")
                .unwrap_or_else(|_| "en".to_string()),
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
pub trait SerpFetcher: Send + Sync {
    /// Fetch the ordered reddit candidates currently on the first page for
    /// one keyword. An empty vec is a valid, non-error outcome.
    async fn fetch(&self, keyword: &str) -> Result<Vec<RankCandidate>, SyncError>;
}

#[derive(Debug)]
pub struct SerpClient {
    http: reqwest::Client,
    config: SerpConfig,
}

impl SerpClient {
    pub fn new(config: SerpConfig) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::provider(format!("building http client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl SerpFetcher for SerpClient {
    async fn fetch(&self, keyword: &str) -> Result<Vec<RankCandidate>, SyncError> {
        let (Some(login), Some(password)) = (&self.config.login, &self.config.password) else {
            return Err(SyncError::configuration("dataforseo"));
        };

        // One page, fixed locale/device. The request is a single-element
        // task array per the provider's live endpoint contract.
        let body = serde_json::json!([{
            "keyword": keyword,
            "location_code": self.config.location_code,
            "language_code": self.config.language_code,
            "depth": 10,
            "device": "desktop",
            "os": "windows",
        }]);

        let url = format!("{}{}", self.config.base_url, SERP_ENDPOINT);
        debug!(keyword, "requesting first-page rankings");

        let response = self
            .http
            .post(&url)
            .basic_auth(login, Some(password))
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::provider(format!("serp request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SyncError::provider(format!("reading serp response: {e}")))?;

        if !status.is_success() {
            return Err(SyncError::provider_status(
                status.as_u16(),
                text.chars().take(512).collect::<String>(),
            ));
        }

        let candidates = parse_serp_body(&text)?;
        info!(keyword, candidates = candidates.len(), "serp fetch complete");
        Ok(candidates)
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    tasks: Option<Vec<SerpTask>>,
}

#[derive(Debug, Deserialize)]
struct SerpTask {
    status_code: i64,
    status_message: Option<String>,
    result: Option<Vec<SerpTaskResult>>,
}

#[derive(Debug, Deserialize)]
struct SerpTaskResult {
    items: Option<Vec<SerpItem>>,
}

#[derive(Debug, Deserialize)]
struct SerpItem {
    #[serde(rename = "type")]
    item_type: Option<String>,
    rank_absolute: Option<i32>,
    #[serde(default, deserialize_with = "string_or_number")]
    position: Option<String>,
    title: Option<String>,
    url: Option<String>,
}

/// `position` arrives as a string or a bare number depending on the item;
/// accept both so one odd item cannot fail the whole response.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Num(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Num(number) => number.to_string(),
    }))
}

/// Parse the provider body, enforcing the task envelope, then filter down to
/// storable reddit candidates.
fn parse_serp_body(body: &str) -> Result<Vec<RankCandidate>, SyncError> {
    let response: SerpResponse = serde_json::from_str(body)
        .map_err(|e| SyncError::provider(format!("malformed serp response: {e}")))?;

    let Some(task) = response.tasks.and_then(|mut tasks| {
        if tasks.is_empty() {
            None
        } else {
            Some(tasks.remove(0))
        }
    }) else {
        return Err(SyncError::provider("serp response carried no task"));
    };

    if task.status_code != TASK_OK {
        return Err(SyncError::provider(format!(
            "task failed ({}): {}",
            task.status_code,
            task.status_message.unwrap_or_else(|| "no message".into())
        )));
    }

    let items = task
        .result
        .unwrap_or_default()
        .into_iter()
        .flat_map(|r| r.items.unwrap_or_default())
        .collect::<Vec<_>>();

    Ok(items.into_iter().filter_map(candidate_from_item).collect())
}

fn candidate_from_item(item: SerpItem) -> Option<RankCandidate> {
    if item.item_type.as_deref() != Some("organic") {
        return None;
    }
    let url = item.url?;
    if !is_target_domain(&url) {
        return None;
    }
    // rank_absolute, falling back to the parsed position field
    let rank = item
        .rank_absolute
        .or_else(|| item.position.as_deref().and_then(|p| p.parse().ok()))?;
    let subreddit = subreddit_from_url(&url)?;
    let candidate = RankCandidate {
        title: strip_bracket_prefix(item.title.as_deref().unwrap_or_default()),
        url,
        subreddit,
        rank_position: rank,
    };
    candidate.rank_in_window().then_some(candidate)
}

/// Host-level check: `reddit.com` or any subdomain of it.
fn is_target_domain(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host = rest.split('/').next().unwrap_or_default();
    host == TARGET_DOMAIN || host.ends_with(&format!(".{TARGET_DOMAIN}"))
}

/// The community identifier is the fixed path segment after `/r/`.
fn subreddit_from_url(url: &str) -> Option<String> {
    let (_, after) = url.split_once("/r/")?;
    let name = after.split('/').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Strip a leading bracketed tag such as `[Review]` from a display title.
fn strip_bracket_prefix(title: &str) -> String {
    let trimmed = title.trim();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some((_, after)) = rest.split_once(']') {
            let cleaned = after.trim();
            if !cleaned.is_empty() {
                return cleaned.to_string();
            }
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_with_items(items: &str) -> String {
        format!(
            r#"{{"tasks":[{{"status_code":20000,"status_message":"Ok.","result":[{{"items":{items}}}]}}]}}"#
        )
    }

    fn organic(url: &str, rank: i32, title: &str) -> String {
        format!(
            r#"{{"type":"organic","rank_group":{rank},"rank_absolute":{rank},"position":"{rank}","title":"{title}","url":"{url}"}}"#
        )
    }

    #[test]
    fn keeps_only_organic_reddit_items_in_rank_window() {
        let items = format!(
            "[{},{},{},{}]",
            organic("https://www.reddit.com/r/running/comments/a/x/", 2, "Thread A"),
            organic("https://example.com/best-shoes", 3, "Not reddit"),
            organic("https://www.reddit.com/r/running/comments/b/y/", 14, "Page two"),
            r#"{"type":"paid","rank_absolute":1,"title":"Ad","url":"https://www.reddit.com/r/ads/"}"#,
        );
        let candidates = parse_serp_body(&body_with_items(&items)).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rank_position, 2);
        assert_eq!(candidates[0].subreddit, "running");
    }

    #[test]
    fn falls_back_to_parsed_position_when_rank_absolute_missing() {
        let items = r#"[{"type":"organic","position":"7","title":"T","url":"https://www.reddit.com/r/shoes/comments/z/"}]"#;
        let candidates = parse_serp_body(&body_with_items(items)).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rank_position, 7);
    }

    #[test]
    fn numeric_position_field_still_deserializes_and_ranks() {
        let items = r#"[{"type":"organic","position":7,"title":"T","url":"https://www.reddit.com/r/shoes/comments/z/"}]"#;
        let candidates = parse_serp_body(&body_with_items(items)).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rank_position, 7);
    }

    #[test]
    fn failed_task_is_a_provider_error_despite_http_success() {
        let body = r#"{"tasks":[{"status_code":40501,"status_message":"Invalid Field.","result":null}]}"#;
        let err = parse_serp_body(body).unwrap_err();
        assert!(err.to_string().contains("Invalid Field."));
    }

    #[test]
    fn empty_successful_result_is_ok_and_empty() {
        let candidates = parse_serp_body(&body_with_items("[]")).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn subreddit_comes_from_the_path_segment() {
        assert_eq!(
            subreddit_from_url("https://www.reddit.com/r/BuyItForLife/comments/q/post/"),
            Some("BuyItForLife".to_string())
        );
        assert_eq!(subreddit_from_url("https://www.reddit.com/user/foo/"), None);
    }

    #[test]
    fn bracket_prefix_stripping() {
        assert_eq!(strip_bracket_prefix("[Review] Great shoes"), "Great shoes");
        assert_eq!(strip_bracket_prefix("No prefix here"), "No prefix here");
        assert_eq!(strip_bracket_prefix("[OnlyTag]"), "[OnlyTag]");
    }

    #[test]
    fn non_reddit_subdomain_lookalikes_are_rejected() {
        assert!(is_target_domain("https://old.reddit.com/r/running/comments/a/"));
        assert!(!is_target_domain("https://notreddit.com/r/running/"));
        assert!(!is_target_domain("https://reddit.com.evil.example/r/x/"));
    }

    #[tokio::test]
    async fn missing_credentials_is_a_configuration_error() {
        let client = SerpClient::new(SerpConfig {
            login: None,
            password: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            location_code: 2840,
            language_code: "en".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let err = client.fetch("best running shoes").await.unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
    }
}
