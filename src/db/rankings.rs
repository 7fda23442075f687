use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::models::{RankedRecommendation, UserId};

/// Persisted recommendation lists, one record per (user, item)
#[async_trait::async_trait]
pub trait RankingRepository: Send + Sync {
    /// Clears the user's previous records and stores `records`
    async fn replace_for_user(
        &self,
        user_id: UserId,
        records: &[RankedRecommendation],
    ) -> AppResult<()>;

    /// The user's stored records, best score first
    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<RankedRecommendation>>;
}

#[derive(sqlx::FromRow)]
struct RankingRow {
    user_id: i64,
    content_id: i64,
    score: f64,
    created_at: DateTime<Utc>,
}

impl From<RankingRow> for RankedRecommendation {
    fn from(row: RankingRow) -> Self {
        Self {
            user_id: row.user_id,
            item_id: row.content_id,
            score: row.score,
            created_at: row.created_at,
        }
    }
}

/// Recommendation records stored in PostgreSQL
#[derive(Clone)]
pub struct PgRankingRepository {
    pool: PgPool,
}

impl PgRankingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RankingRepository for PgRankingRepository {
    async fn replace_for_user(
        &self,
        user_id: UserId,
        records: &[RankedRecommendation],
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recommendations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for record in records {
            sqlx::query(
                "INSERT INTO recommendations (user_id, content_id, score, created_at) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (user_id, content_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(record.item_id)
            .bind(record.score)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<RankedRecommendation>> {
        let rows: Vec<RankingRow> = sqlx::query_as(
            "SELECT user_id, content_id, score, created_at FROM recommendations \
             WHERE user_id = $1 ORDER BY score DESC, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RankedRecommendation::from).collect())
    }
}

/// Recommendation records held in memory
#[derive(Default)]
pub struct InMemoryRankingRepository {
    records: RwLock<HashMap<UserId, Vec<RankedRecommendation>>>,
}

impl InMemoryRankingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RankingRepository for InMemoryRankingRepository {
    async fn replace_for_user(
        &self,
        user_id: UserId,
        records: &[RankedRecommendation],
    ) -> AppResult<()> {
        let mut unique: Vec<RankedRecommendation> = Vec::with_capacity(records.len());
        for record in records {
            if !unique.iter().any(|r| r.item_id == record.item_id) {
                unique.push(RankedRecommendation {
                    user_id,
                    ..record.clone()
                });
            }
        }
        self.records.write().await.insert(user_id, unique);
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<RankedRecommendation>> {
        let mut records = self
            .records
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        records.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(item_id: i64, score: f64) -> RankedRecommendation {
        RankedRecommendation {
            user_id: 1,
            item_id,
            score,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_replace_clears_previous_records() {
        let repo = InMemoryRankingRepository::new();
        repo.replace_for_user(1, &[record(10, 0.4), record(11, 0.9)])
            .await
            .unwrap();
        repo.replace_for_user(1, &[record(12, 0.2)]).await.unwrap();

        let stored = repo.list_for_user(1).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].item_id, 12);
    }

    #[tokio::test]
    async fn test_records_unique_per_item_and_sorted() {
        let repo = InMemoryRankingRepository::new();
        repo.replace_for_user(1, &[record(10, 0.4), record(11, 0.9), record(10, 0.7)])
            .await
            .unwrap();

        let stored = repo.list_for_user(1).await.unwrap();
        let ids: Vec<i64> = stored.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![11, 10]);
        assert!(repo.list_for_user(2).await.unwrap().is_empty());
    }
}
