//! Core domain model for redrank.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::SyncError;

pub const CRATE_NAME: &str = "redrank-core";

/// Stored enrichment older than this is eligible for a refresh fetch.
pub const ENRICHMENT_STALE_AFTER_HOURS: i64 = 24;

/// Lowest and highest first-page rank the engine will store.
pub const RANK_MIN: i32 = 1;
pub const RANK_MAX: i32 = 10;

/// A keyword registered for ongoing ranking observation. Created and deleted
/// by keyword management elsewhere; this engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedKeyword {
    pub id: Uuid,
    pub keyword: String,
    pub created_at: DateTime<Utc>,
}

/// One reddit post currently believed to rank on the first page for one
/// keyword. Unique per (keyword_id, url).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPost {
    pub id: Uuid,
    pub keyword_id: Uuid,
    pub url: String,
    pub title: String,
    pub subreddit: String,
    pub rank_position: i32,
    pub first_seen_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub enrichment: Option<serde_json::Value>,
    pub enriched_at: Option<DateTime<Utc>>,
}

impl RankedPost {
    /// Whether the stored enrichment has aged past the staleness window.
    /// A post that was never enriched is always stale.
    pub fn enrichment_is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.enriched_at {
            Some(at) => now - at > Duration::hours(ENRICHMENT_STALE_AFTER_HOURS),
            None => true,
        }
    }
}

/// Immutable point-in-time rank observation. Appended on every insert or
/// update of its parent post, deleted only by cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankHistory {
    pub id: Uuid,
    pub post_id: Uuid,
    pub rank_position: i32,
    pub observed_at: DateTime<Utc>,
}

/// One first-page organic result the search provider attributes to reddit,
/// already filtered to the storable rank window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankCandidate {
    pub url: String,
    pub title: String,
    pub subreddit: String,
    pub rank_position: i32,
}

impl RankCandidate {
    pub fn rank_in_window(&self) -> bool {
        (RANK_MIN..=RANK_MAX).contains(&self.rank_position)
    }
}

/// A candidate paired with whatever enrichment this pass fetched for it.
/// `enrichment == None` means the fetch was skipped or came back empty;
/// the reconciler then leaves any previously stored payload untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCandidate {
    pub candidate: RankCandidate,
    pub enrichment: Option<serde_json::Value>,
}

/// Aggregate outcome of one batch pass over all tracked keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<KeywordOutcome>,
}

/// Per-keyword detail inside a batch summary: either a resulting post count
/// or the error message that aborted that keyword's pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordOutcome {
    pub keyword_id: Uuid,
    pub keyword: String,
    pub posts: Option<usize>,
    pub error: Option<String>,
}

impl KeywordOutcome {
    pub fn succeeded(keyword: &TrackedKeyword, posts: usize) -> Self {
        Self {
            keyword_id: keyword.id,
            keyword: keyword.keyword.clone(),
            posts: Some(posts),
            error: None,
        }
    }

    pub fn failed(keyword: &TrackedKeyword, error: &SyncError) -> Self {
        Self {
            keyword_id: keyword.id,
            keyword: keyword.keyword.clone(),
            posts: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post_enriched_at(enriched_at: Option<DateTime<Utc>>) -> RankedPost {
        RankedPost {
            id: Uuid::new_v4(),
            keyword_id: Uuid::new_v4(),
            url: "https://www.reddit.com/r/running/comments/abc/shoes/".into(),
            title: "Best shoes thread".into(),
            subreddit: "running".into(),
            rank_position: 3,
            first_seen_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).single().unwrap(),
            last_checked_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).single().unwrap(),
            enrichment: None,
            enriched_at,
        }
    }

    #[test]
    fn never_enriched_post_is_stale() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 0, 0, 0).single().unwrap();
        assert!(post_enriched_at(None).enrichment_is_stale(now));
    }

    #[test]
    fn one_hour_old_enrichment_is_fresh() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).single().unwrap();
        let post = post_enriched_at(Some(now - Duration::hours(1)));
        assert!(!post.enrichment_is_stale(now));
    }

    #[test]
    fn twenty_five_hour_old_enrichment_is_stale() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).single().unwrap();
        let post = post_enriched_at(Some(now - Duration::hours(25)));
        assert!(post.enrichment_is_stale(now));
    }

    #[test]
    fn exactly_twenty_four_hours_is_not_yet_stale() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).single().unwrap();
        let post = post_enriched_at(Some(now - Duration::hours(24)));
        assert!(!post.enrichment_is_stale(now));
    }

    #[test]
    fn rank_window_bounds() {
        let mut candidate = RankCandidate {
            url: "https://www.reddit.com/r/running/comments/abc/".into(),
            title: "t".into(),
            subreddit: "running".into(),
            rank_position: 1,
        };
        assert!(candidate.rank_in_window());
        candidate.rank_position = 10;
        assert!(candidate.rank_in_window());
        candidate.rank_position = 0;
        assert!(!candidate.rank_in_window());
        candidate.rank_position = 11;
        assert!(!candidate.rank_in_window());
    }
}
