//! Postgres implementation of the persistence interface.

use async_trait::async_trait;
use redrank_core::{RankHistory, RankedPost, SyncError, TrackedKeyword};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::{RankStore, ReconcilePlan};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone)]
pub struct PgRankStore {
    pool: PgPool,
}

impl PgRankStore {
    pub async fn connect(database_url: &str) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), SyncError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| SyncError::Persistence(e.into()))
    }
}

fn post_from_row(row: &PgRow) -> Result<RankedPost, sqlx::Error> {
    Ok(RankedPost {
        id: row.try_get("id")?,
        keyword_id: row.try_get("keyword_id")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        subreddit: row.try_get("subreddit")?,
        rank_position: row.try_get("rank_position")?,
        first_seen_at: row.try_get("first_seen_at")?,
        last_checked_at: row.try_get("last_checked_at")?,
        enrichment: row.try_get("enrichment")?,
        enriched_at: row.try_get("enriched_at")?,
    })
}

const POST_COLUMNS: &str = "id, keyword_id, url, title, subreddit, rank_position, \
                            first_seen_at, last_checked_at, enrichment, enriched_at";

#[async_trait]
impl RankStore for PgRankStore {
    async fn keywords(&self) -> Result<Vec<TrackedKeyword>, SyncError> {
        let rows = sqlx::query(
            "SELECT id, keyword, created_at FROM tracked_keywords ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TrackedKeyword {
                    id: row.try_get("id")?,
                    keyword: row.try_get("keyword")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(SyncError::from)
    }

    async fn keyword(&self, id: Uuid) -> Result<Option<TrackedKeyword>, SyncError> {
        let row = sqlx::query("SELECT id, keyword, created_at FROM tracked_keywords WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(TrackedKeyword {
                id: row.try_get("id")?,
                keyword: row.try_get("keyword")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
        .map_err(SyncError::Persistence)
    }

    async fn find_post(
        &self,
        keyword_id: Uuid,
        url: &str,
    ) -> Result<Option<RankedPost>, SyncError> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM ranked_posts WHERE keyword_id = $1 AND url = $2"
        ))
        .bind(keyword_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(post_from_row)
            .transpose()
            .map_err(SyncError::Persistence)
    }

    async fn posts_for_keyword(&self, keyword_id: Uuid) -> Result<Vec<RankedPost>, SyncError> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM ranked_posts WHERE keyword_id = $1 ORDER BY rank_position"
        ))
        .bind(keyword_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(SyncError::from)
    }

    async fn history_for_post(&self, post_id: Uuid) -> Result<Vec<RankHistory>, SyncError> {
        let rows = sqlx::query(
            "SELECT id, post_id, rank_position, observed_at \
             FROM rank_history WHERE post_id = $1 ORDER BY observed_at",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RankHistory {
                    id: row.try_get("id")?,
                    post_id: row.try_get("post_id")?,
                    rank_position: row.try_get("rank_position")?,
                    observed_at: row.try_get("observed_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(SyncError::from)
    }

    async fn apply(
        &self,
        keyword_id: Uuid,
        plan: ReconcilePlan,
    ) -> Result<Vec<RankedPost>, SyncError> {
        let mut tx = self.pool.begin().await?;

        for upsert in &plan.upserts {
            // Atomic conditional write: a concurrent pass on the same keyword
            // converges to the later writer instead of racing a select-then-insert.
            let row = sqlx::query(&format!(
                "INSERT INTO ranked_posts \
                     (id, keyword_id, url, title, subreddit, rank_position, \
                      first_seen_at, last_checked_at, enrichment, enriched_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, \
                         CASE WHEN $8::jsonb IS NULL THEN NULL ELSE $7 END) \
                 ON CONFLICT (keyword_id, url) DO UPDATE SET \
                     title = EXCLUDED.title, \
                     subreddit = EXCLUDED.subreddit, \
                     rank_position = EXCLUDED.rank_position, \
                     last_checked_at = EXCLUDED.last_checked_at, \
                     enrichment = COALESCE(EXCLUDED.enrichment, ranked_posts.enrichment), \
                     enriched_at = CASE WHEN EXCLUDED.enrichment IS NULL \
                                        THEN ranked_posts.enriched_at \
                                        ELSE EXCLUDED.last_checked_at END \
                 RETURNING {POST_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(keyword_id)
            .bind(&upsert.url)
            .bind(&upsert.title)
            .bind(&upsert.subreddit)
            .bind(upsert.rank_position)
            .bind(upsert.observed_at)
            .bind(&upsert.enrichment)
            .fetch_one(&mut *tx)
            .await?;

            let post = post_from_row(&row)?;

            sqlx::query(
                "INSERT INTO rank_history (id, post_id, rank_position, observed_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(post.id)
            .bind(upsert.rank_position)
            .bind(upsert.observed_at)
            .execute(&mut *tx)
            .await?;
        }

        if !plan.delete_ids.is_empty() {
            // history rows go with the post via ON DELETE CASCADE
            let deleted = sqlx::query("DELETE FROM ranked_posts WHERE id = ANY($1)")
                .bind(&plan.delete_ids)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            debug!(keyword_id = %keyword_id, deleted, "removed posts absent from snapshot");
        }

        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM ranked_posts WHERE keyword_id = $1 ORDER BY rank_position"
        ))
        .bind(keyword_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        rows.iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(SyncError::from)
    }
}
