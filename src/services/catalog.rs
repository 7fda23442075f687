use std::sync::Arc;

use super::model_cache::ModelCache;
use crate::db::CatalogRepository;
use crate::error::{AppError, AppResult};
use crate::models::{CatalogItem, ItemId};

/// Catalog write path
///
/// Every successful create, update or delete drops the cached model. The
/// cache has no versioning, so staleness is handled by full invalidation.
pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
    cache: ModelCache,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogRepository>, cache: ModelCache) -> Self {
        Self { catalog, cache }
    }

    pub async fn create_item(&self, item: &CatalogItem) -> AppResult<()> {
        validate(item)?;
        if self.catalog.get_item(item.id).await?.is_some() {
            return Err(AppError::InvalidInput(format!(
                "content {} already exists",
                item.id
            )));
        }
        self.catalog.upsert_item(item).await?;
        tracing::info!(item_id = item.id, title = %item.title, "Content created");
        self.cache.invalidate().await
    }

    pub async fn update_item(&self, item: &CatalogItem) -> AppResult<()> {
        validate(item)?;
        if self.catalog.get_item(item.id).await?.is_none() {
            return Err(AppError::NotFound(format!("content {}", item.id)));
        }
        self.catalog.upsert_item(item).await?;
        tracing::info!(item_id = item.id, title = %item.title, "Content updated");
        self.cache.invalidate().await
    }

    pub async fn delete_item(&self, id: ItemId) -> AppResult<()> {
        if !self.catalog.delete_item(id).await? {
            return Err(AppError::NotFound(format!("content {}", id)));
        }
        tracing::info!(item_id = id, "Content deleted");
        self.cache.invalidate().await
    }
}

fn validate(item: &CatalogItem) -> AppResult<()> {
    if item.id <= 0 {
        return Err(AppError::InvalidInput(
            "content id must be a positive number".to_string(),
        ));
    }
    if item.title.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "content title must not be empty".to_string(),
        ));
    }
    Ok(())
}
