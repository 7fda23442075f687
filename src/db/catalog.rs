use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{CatalogItem, ContentKind, ItemId};

/// Read and write access to catalog items
///
/// The recommender only reads; writes exist so mutations can be routed
/// through [`crate::services::CatalogService`], which invalidates the model
/// cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Every item, in a stable order
    async fn all_items(&self) -> AppResult<Vec<CatalogItem>>;

    async fn get_item(&self, id: ItemId) -> AppResult<Option<CatalogItem>>;

    /// First item whose title contains `fragment`, ignoring case
    async fn find_by_title(&self, fragment: &str) -> AppResult<Option<CatalogItem>>;

    /// Inserts or replaces an item, returns true if it was created
    async fn upsert_item(&self, item: &CatalogItem) -> AppResult<bool>;

    /// Deletes an item, returns false if it did not exist
    async fn delete_item(&self, id: ItemId) -> AppResult<bool>;
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    tmdb_id: i64,
    title: String,
    kind: String,
    genres: Vec<String>,
    actors: Vec<String>,
    directors: Vec<String>,
}

impl TryFrom<ContentRow> for CatalogItem {
    type Error = AppError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let kind: ContentKind = row.kind.parse().map_err(AppError::Internal)?;
        let directors = match kind {
            ContentKind::Movie => Some(row.directors),
            ContentKind::Series => None,
        };
        Ok(CatalogItem {
            id: row.tmdb_id,
            title: row.title,
            kind,
            genres: row.genres,
            actors: row.actors,
            directors,
        })
    }
}

const SELECT_CONTENT: &str = r#"
SELECT c.tmdb_id, c.title, c.kind,
    COALESCE((SELECT array_agg(g.name ORDER BY g.position)
              FROM content_genres g WHERE g.content_id = c.tmdb_id), '{}') AS genres,
    COALESCE((SELECT array_agg(a.name ORDER BY a.position)
              FROM content_actors a WHERE a.content_id = c.tmdb_id), '{}') AS actors,
    COALESCE((SELECT array_agg(d.name ORDER BY d.position)
              FROM content_directors d WHERE d.content_id = c.tmdb_id), '{}') AS directors
FROM content c
"#;

/// Catalog backed by the PostgreSQL content tables
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace_names(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        table: &str,
        content_id: ItemId,
        names: &[String],
    ) -> AppResult<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE content_id = $1", table))
            .bind(content_id)
            .execute(&mut **tx)
            .await?;

        let insert = format!(
            "INSERT INTO {} (content_id, position, name) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            table
        );
        for (position, name) in names.iter().enumerate() {
            sqlx::query(&insert)
                .bind(content_id)
                .bind(position as i32)
                .bind(name)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

/// Escapes LIKE wildcards so titles match literally
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait::async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn all_items(&self) -> AppResult<Vec<CatalogItem>> {
        let sql = format!("{} ORDER BY c.tmdb_id", SELECT_CONTENT);
        let rows: Vec<ContentRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(CatalogItem::try_from).collect()
    }

    async fn get_item(&self, id: ItemId) -> AppResult<Option<CatalogItem>> {
        let sql = format!("{} WHERE c.tmdb_id = $1", SELECT_CONTENT);
        let row: Option<ContentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn find_by_title(&self, fragment: &str) -> AppResult<Option<CatalogItem>> {
        let sql = format!(
            "{} WHERE c.title ILIKE $1 ESCAPE '\\' ORDER BY c.tmdb_id LIMIT 1",
            SELECT_CONTENT
        );
        let row: Option<ContentRow> = sqlx::query_as(&sql)
            .bind(like_pattern(fragment))
            .fetch_optional(&self.pool)
            .await?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn upsert_item(&self, item: &CatalogItem) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let created: bool = sqlx::query_scalar(
            "INSERT INTO content (tmdb_id, title, kind) VALUES ($1, $2, $3) \
             ON CONFLICT (tmdb_id) DO UPDATE SET title = EXCLUDED.title, kind = EXCLUDED.kind \
             RETURNING (xmax = 0)",
        )
        .bind(item.id)
        .bind(&item.title)
        .bind(item.kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        Self::replace_names(&mut tx, "content_genres", item.id, &item.genres).await?;
        Self::replace_names(&mut tx, "content_actors", item.id, &item.actors).await?;
        Self::replace_names(&mut tx, "content_directors", item.id, item.director_names()).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn delete_item(&self, id: ItemId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM content WHERE tmdb_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Catalog held in memory, in insertion order
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    items: RwLock<Vec<CatalogItem>>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<CatalogItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn all_items(&self) -> AppResult<Vec<CatalogItem>> {
        Ok(self.items.read().await.clone())
    }

    async fn get_item(&self, id: ItemId) -> AppResult<Option<CatalogItem>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item.id == id).cloned())
    }

    async fn find_by_title(&self, fragment: &str) -> AppResult<Option<CatalogItem>> {
        let needle = fragment.to_lowercase();
        let items = self.items.read().await;
        Ok(items
            .iter()
            .find(|item| item.title.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn upsert_item(&self, item: &CatalogItem) -> AppResult<bool> {
        let mut items = self.items.write().await;
        if let Some(existing) = items.iter_mut().find(|existing| existing.id == item.id) {
            *existing = item.clone();
            return Ok(false);
        }
        items.push(item.clone());
        Ok(true)
    }

    async fn delete_item(&self, id: ItemId) -> AppResult<bool> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|item| item.id != id);
        Ok(items.len() != before)
    }
}
