use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{InteractionKind, ItemId, UserId, UserInteraction};

/// Log of user interactions, one record per (user, item, kind)
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Stores `interaction` unless the same (user, item, kind) exists;
    /// returns true when a record was created
    async fn record(&self, interaction: &UserInteraction) -> AppResult<bool>;

    /// Deletes the matching record; returns false if there was none
    async fn remove(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionKind,
    ) -> AppResult<bool>;

    /// The user's interactions, oldest first
    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<UserInteraction>>;
}

#[derive(sqlx::FromRow)]
struct InteractionRow {
    user_id: i64,
    content_id: i64,
    interaction_type: String,
    rating: Option<i32>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<InteractionRow> for UserInteraction {
    type Error = AppError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        Ok(UserInteraction {
            user_id: row.user_id,
            item_id: row.content_id,
            kind: row.interaction_type.parse().map_err(AppError::Internal)?,
            rating: row.rating,
            recorded_at: row.recorded_at,
        })
    }
}

/// Interactions stored in PostgreSQL
#[derive(Clone)]
pub struct PgInteractionRepository {
    pool: PgPool,
}

impl PgInteractionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InteractionRepository for PgInteractionRepository {
    async fn record(&self, interaction: &UserInteraction) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_interactions \
             (user_id, content_id, interaction_type, rating, recorded_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, content_id, interaction_type) DO NOTHING",
        )
        .bind(interaction.user_id)
        .bind(interaction.item_id)
        .bind(interaction.kind.as_str())
        .bind(interaction.rating)
        .bind(interaction.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionKind,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM user_interactions \
             WHERE user_id = $1 AND content_id = $2 AND interaction_type = $3",
        )
        .bind(user_id)
        .bind(item_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<UserInteraction>> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            "SELECT user_id, content_id, interaction_type, rating, recorded_at \
             FROM user_interactions WHERE user_id = $1 ORDER BY recorded_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(UserInteraction::try_from).collect()
    }
}

/// Interactions held in memory, in recording order
#[derive(Default)]
pub struct InMemoryInteractionRepository {
    records: RwLock<Vec<UserInteraction>>,
}

impl InMemoryInteractionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InteractionRepository for InMemoryInteractionRepository {
    async fn record(&self, interaction: &UserInteraction) -> AppResult<bool> {
        let mut records = self.records.write().await;
        let exists = records.iter().any(|r| {
            r.user_id == interaction.user_id
                && r.item_id == interaction.item_id
                && r.kind == interaction.kind
        });
        if exists {
            return Ok(false);
        }
        records.push(interaction.clone());
        Ok(true)
    }

    async fn remove(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionKind,
    ) -> AppResult<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !(r.user_id == user_id && r.item_id == item_id && r.kind == kind));
        Ok(records.len() != before)
    }

    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<UserInteraction>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
