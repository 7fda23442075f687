use std::collections::BTreeMap;

use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::models::{ItemId, UserId, UserPreferences};

/// Storage for per-user preference records
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Loads a user's preferences, creating an empty record on first access
    async fn get_or_create(&self, user_id: UserId) -> AppResult<UserPreferences>;

    /// Every user that has a preference record
    async fn user_ids(&self) -> AppResult<Vec<UserId>>;

    /// Writes the full record: liked set, disliked set and fingerprint
    async fn save(&self, preferences: &UserPreferences) -> AppResult<()>;

    /// Updates only the fingerprint column
    async fn set_fingerprint(&self, user_id: UserId, fingerprint: &[f64]) -> AppResult<()>;
}

/// Preferences stored in PostgreSQL
#[derive(Clone)]
pub struct PgPreferenceRepository {
    pool: PgPool,
}

impl PgPreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn item_ids(&self, table: &str, user_id: UserId) -> AppResult<Vec<ItemId>> {
        let sql = format!(
            "SELECT content_id FROM {} WHERE user_id = $1 ORDER BY added_at, content_id",
            table
        );
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Makes the table hold exactly `ids` for the user
    ///
    /// Rows that stay keep their `added_at`; new rows are stamped in the
    /// order given so favorites list back in the order they were added.
    async fn sync_item_ids(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        table: &str,
        user_id: UserId,
        ids: &[ItemId],
    ) -> AppResult<()> {
        sqlx::query(&prune_sql(table))
            .bind(user_id)
            .bind(ids)
            .execute(&mut **tx)
            .await?;

        sqlx::query(&append_sql(table))
            .bind(user_id)
            .bind(ids)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn prune_sql(table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE user_id = $1 AND NOT (content_id = ANY($2))",
        table
    )
}

// Ids missing from the catalog are skipped
fn append_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (user_id, content_id, added_at) \
         SELECT $1, ids.id, now() + ids.ord * interval '1 microsecond' \
         FROM unnest($2::BIGINT[]) WITH ORDINALITY AS ids(id, ord) \
         JOIN content ON content.tmdb_id = ids.id \
         ON CONFLICT (user_id, content_id) DO NOTHING",
        table
    )
}

#[async_trait::async_trait]
impl PreferenceRepository for PgPreferenceRepository {
    async fn get_or_create(&self, user_id: UserId) -> AppResult<UserPreferences> {
        sqlx::query("INSERT INTO user_preferences (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let fingerprint: Vec<f64> =
            sqlx::query_scalar("SELECT preference_vector FROM user_preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(UserPreferences {
            user_id,
            liked: self.item_ids("user_favorite_content", user_id).await?,
            disliked: self.item_ids("user_disliked_content", user_id).await?,
            fingerprint,
        })
    }

    async fn user_ids(&self) -> AppResult<Vec<UserId>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT user_id FROM user_preferences ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn save(&self, preferences: &UserPreferences) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO user_preferences (user_id, preference_vector) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET preference_vector = EXCLUDED.preference_vector",
        )
        .bind(preferences.user_id)
        .bind(&preferences.fingerprint)
        .execute(&mut *tx)
        .await?;

        Self::sync_item_ids(
            &mut tx,
            "user_favorite_content",
            preferences.user_id,
            &preferences.liked,
        )
        .await?;
        Self::sync_item_ids(
            &mut tx,
            "user_disliked_content",
            preferences.user_id,
            &preferences.disliked,
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_fingerprint(&self, user_id: UserId, fingerprint: &[f64]) -> AppResult<()> {
        sqlx::query("UPDATE user_preferences SET preference_vector = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(fingerprint)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Preferences held in memory
#[derive(Default)]
pub struct InMemoryPreferenceRepository {
    records: RwLock<BTreeMap<UserId, UserPreferences>>,
}

impl InMemoryPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn get_or_create(&self, user_id: UserId) -> AppResult<UserPreferences> {
        let mut records = self.records.write().await;
        Ok(records
            .entry(user_id)
            .or_insert_with(|| UserPreferences::new(user_id))
            .clone())
    }

    async fn user_ids(&self) -> AppResult<Vec<UserId>> {
        Ok(self.records.read().await.keys().copied().collect())
    }

    async fn save(&self, preferences: &UserPreferences) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert(preferences.user_id, preferences.clone());
        Ok(())
    }

    async fn set_fingerprint(&self, user_id: UserId, fingerprint: &[f64]) -> AppResult<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&user_id) {
            record.fingerprint = fingerprint.to_vec();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_keeps_existing_rows() {
        let prune = prune_sql("user_favorite_content");
        assert!(prune.contains("NOT (content_id = ANY($2))"));

        let append = append_sql("user_favorite_content");
        assert!(append.contains("ON CONFLICT (user_id, content_id) DO NOTHING"));
        assert!(append.contains("WITH ORDINALITY"));
    }

    #[tokio::test]
    async fn test_favorite_order_survives_saves() {
        let repo = InMemoryPreferenceRepository::new();
        let mut prefs = repo.get_or_create(1).await.unwrap();
        for id in [680, 155, 13] {
            prefs.add_liked(id);
            repo.save(&prefs).await.unwrap();
        }
        prefs.remove_liked(155);
        prefs.add_liked(550);
        repo.save(&prefs).await.unwrap();

        assert_eq!(repo.get_or_create(1).await.unwrap().liked, vec![680, 13, 550]);
    }

    #[tokio::test]
    async fn test_get_or_create_registers_user() {
        let repo = InMemoryPreferenceRepository::new();
        let prefs = repo.get_or_create(42).await.unwrap();
        assert_eq!(prefs, UserPreferences::new(42));
        assert_eq!(repo.user_ids().await.unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn test_set_fingerprint_leaves_likes_untouched() {
        let repo = InMemoryPreferenceRepository::new();
        let mut prefs = repo.get_or_create(1).await.unwrap();
        prefs.add_liked(603);
        repo.save(&prefs).await.unwrap();

        repo.set_fingerprint(1, &[0.5, 0.5]).await.unwrap();

        let stored = repo.get_or_create(1).await.unwrap();
        assert_eq!(stored.liked, vec![603]);
        assert_eq!(stored.fingerprint, vec![0.5, 0.5]);
    }
}
