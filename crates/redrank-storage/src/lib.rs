//! Persistence interface + enrichment pacing for redrank.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redrank_core::{RankHistory, RankedPost, SyncError, TrackedKeyword};
use tokio::sync::Mutex;
use uuid::Uuid;

pub mod pacer;
pub mod postgres;

pub use pacer::{DelayPacer, NoopPacer, Pacer};
pub use postgres::PgRankStore;

pub const CRATE_NAME: &str = "redrank-storage";

/// One upsert the reconciler has decided on for a keyword.
///
/// `enrichment` is only the payload fetched *this* pass; `None` means the
/// store keeps whatever enrichment the row already carries.
#[derive(Debug, Clone)]
pub struct PlannedUpsert {
    pub url: String,
    pub title: String,
    pub subreddit: String,
    pub rank_position: i32,
    pub observed_at: DateTime<Utc>,
    pub enrichment: Option<serde_json::Value>,
}

/// The full write set for one keyword's reconciliation pass. Executed
/// atomically by the store: every upsert appends one history row, deletions
/// cascade their history.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub upserts: Vec<PlannedUpsert>,
    pub delete_ids: Vec<Uuid>,
}

/// Abstract persistence consumed by the sync engine. Reads are individual
/// operations; the write side is a single transactional `apply` so partial
/// reconciliation can never be observed.
#[async_trait]
pub trait RankStore: Send + Sync {
    async fn keywords(&self) -> Result<Vec<TrackedKeyword>, SyncError>;

    async fn keyword(&self, id: Uuid) -> Result<Option<TrackedKeyword>, SyncError>;

    async fn find_post(
        &self,
        keyword_id: Uuid,
        url: &str,
    ) -> Result<Option<RankedPost>, SyncError>;

    async fn posts_for_keyword(&self, keyword_id: Uuid) -> Result<Vec<RankedPost>, SyncError>;

    async fn history_for_post(&self, post_id: Uuid) -> Result<Vec<RankHistory>, SyncError>;

    /// Execute the plan and return the keyword's stored posts afterwards,
    /// ordered by rank position.
    async fn apply(
        &self,
        keyword_id: Uuid,
        plan: ReconcilePlan,
    ) -> Result<Vec<RankedPost>, SyncError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    keywords: Vec<TrackedKeyword>,
    posts: Vec<RankedPost>,
    history: Vec<RankHistory>,
}

/// In-memory store used by unit tests across the workspace. One mutex over
/// the whole state, so `apply` is trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_keyword(&self, keyword: &str) -> TrackedKeyword {
        let tracked = TrackedKeyword {
            id: Uuid::new_v4(),
            keyword: keyword.to_string(),
            created_at: Utc::now(),
        };
        self.inner.lock().await.keywords.push(tracked.clone());
        tracked
    }

    /// Seed a post directly, bypassing the plan path. Test setup only.
    pub async fn seed_post(&self, post: RankedPost) {
        self.inner.lock().await.posts.push(post);
    }

    pub async fn history_len(&self) -> usize {
        self.inner.lock().await.history.len()
    }
}

#[async_trait]
impl RankStore for MemoryStore {
    async fn keywords(&self) -> Result<Vec<TrackedKeyword>, SyncError> {
        Ok(self.inner.lock().await.keywords.clone())
    }

    async fn keyword(&self, id: Uuid) -> Result<Option<TrackedKeyword>, SyncError> {
        Ok(self
            .inner
            .lock()
            .await
            .keywords
            .iter()
            .find(|k| k.id == id)
            .cloned())
    }

    async fn find_post(
        &self,
        keyword_id: Uuid,
        url: &str,
    ) -> Result<Option<RankedPost>, SyncError> {
        Ok(self
            .inner
            .lock()
            .await
            .posts
            .iter()
            .find(|p| p.keyword_id == keyword_id && p.url == url)
            .cloned())
    }

    async fn posts_for_keyword(&self, keyword_id: Uuid) -> Result<Vec<RankedPost>, SyncError> {
        let mut posts: Vec<_> = self
            .inner
            .lock()
            .await
            .posts
            .iter()
            .filter(|p| p.keyword_id == keyword_id)
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.rank_position);
        Ok(posts)
    }

    async fn history_for_post(&self, post_id: Uuid) -> Result<Vec<RankHistory>, SyncError> {
        Ok(self
            .inner
            .lock()
            .await
            .history
            .iter()
            .filter(|h| h.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn apply(
        &self,
        keyword_id: Uuid,
        plan: ReconcilePlan,
    ) -> Result<Vec<RankedPost>, SyncError> {
        let mut inner = self.inner.lock().await;

        for upsert in plan.upserts {
            let post_id = match inner
                .posts
                .iter_mut()
                .find(|p| p.keyword_id == keyword_id && p.url == upsert.url)
            {
                Some(existing) => {
                    existing.title = upsert.title;
                    existing.subreddit = upsert.subreddit;
                    existing.rank_position = upsert.rank_position;
                    existing.last_checked_at = upsert.observed_at;
                    if let Some(payload) = upsert.enrichment {
                        existing.enrichment = Some(payload);
                        existing.enriched_at = Some(upsert.observed_at);
                    }
                    existing.id
                }
                None => {
                    let enriched_at = upsert.enrichment.as_ref().map(|_| upsert.observed_at);
                    let post = RankedPost {
                        id: Uuid::new_v4(),
                        keyword_id,
                        url: upsert.url,
                        title: upsert.title,
                        subreddit: upsert.subreddit,
                        rank_position: upsert.rank_position,
                        first_seen_at: upsert.observed_at,
                        last_checked_at: upsert.observed_at,
                        enrichment: upsert.enrichment,
                        enriched_at,
                    };
                    let id = post.id;
                    inner.posts.push(post);
                    id
                }
            };

            inner.history.push(RankHistory {
                id: Uuid::new_v4(),
                post_id,
                rank_position: upsert.rank_position,
                observed_at: upsert.observed_at,
            });
        }

        if !plan.delete_ids.is_empty() {
            inner.posts.retain(|p| !plan.delete_ids.contains(&p.id));
            inner
                .history
                .retain(|h| !plan.delete_ids.contains(&h.post_id));
        }

        let mut posts: Vec<_> = inner
            .posts
            .iter()
            .filter(|p| p.keyword_id == keyword_id)
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.rank_position);
        Ok(posts)
    }
}
