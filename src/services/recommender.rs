use std::collections::HashSet;
use std::sync::Arc;

use super::features::feature_blob;
use super::model_cache::ModelCache;
use super::sampler;
use super::vector_space::VectorSpace;
use super::vectorizer::TokenizerOptions;
use crate::db::CatalogRepository;
use crate::error::AppResult;
use crate::models::{CatalogItem, ItemId, RecommendationQuery, ScoredItem};

/// Score forced onto disliked items, below any cosine similarity
pub const DISLIKED_SCORE: f64 = -1.0;

/// Content-based recommender over the cached catalog vector space
///
/// The catalog and the model cache are injected so the same engine runs
/// against PostgreSQL with a file or Redis cache, or fully in memory.
pub struct Recommender {
    catalog: Arc<dyn CatalogRepository>,
    cache: ModelCache,
    options: TokenizerOptions,
}

impl Recommender {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        cache: ModelCache,
        options: TokenizerOptions,
    ) -> Self {
        Self {
            catalog,
            cache,
            options,
        }
    }

    /// Fits the vector space over the whole catalog and caches it
    ///
    /// Always rebuilds. Returns `None` without touching the cache when the
    /// catalog is empty.
    #[tracing::instrument(skip(self))]
    pub async fn fit(&self) -> AppResult<Option<VectorSpace>> {
        let items = self.catalog.all_items().await?;
        let item_count = items.len();
        let options = self.options;

        let space =
            tokio::task::spawn_blocking(move || VectorSpace::fit(&items, options)).await??;

        match &space {
            Some(space) => {
                self.cache.save(space).await?;
                tracing::info!(
                    items = item_count,
                    vocabulary = space.vectorizer().vocabulary_size(),
                    "Model fitted"
                );
            }
            None => tracing::info!("Nothing to fit: catalog is empty"),
        }

        Ok(space)
    }

    /// Cached vector space, fitting it on a miss
    pub async fn vector_space(&self) -> AppResult<Option<VectorSpace>> {
        if let Some(space) = self.cache.load().await? {
            return Ok(Some(space));
        }
        self.fit().await
    }

    /// Drops the cached model; the next request refits
    pub async fn invalidate_cache(&self) -> AppResult<()> {
        self.cache.invalidate().await
    }

    /// Ranks catalog items against the query
    ///
    /// An empty query (no names, no known liked items) or an unfitted
    /// catalog falls back to a random sample. Otherwise at most `top_n`
    /// items are returned, each with a strictly positive score and none of
    /// them disliked.
    pub async fn recommend(
        &self,
        query: &RecommendationQuery,
        top_n: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        let space = self.vector_space().await?;
        let text = self.query_text(query).await?;

        if text.trim().is_empty() {
            tracing::debug!("Empty query, returning random picks");
            return self.cold_start(top_n).await;
        }
        let Some(space) = space.filter(|space| !space.is_empty()) else {
            tracing::debug!("No fitted model, returning random picks");
            return self.cold_start(top_n).await;
        };

        let ranked = rank(&space, &text, &query.disliked_ids, top_n);

        let mut results = Vec::with_capacity(ranked.len());
        for (item_id, score) in ranked {
            match self.catalog.get_item(item_id).await? {
                Some(item) => results.push(ScoredItem {
                    item,
                    score: Some(score),
                }),
                None => tracing::debug!(item_id, "Ranked item no longer in catalog"),
            }
        }

        tracing::info!(
            query = %text.trim(),
            returned = results.len(),
            "Recommendations computed"
        );
        Ok(results)
    }

    /// A single random catalog item
    pub async fn random_pick(&self) -> AppResult<Option<CatalogItem>> {
        let items = self.catalog.all_items().await?;
        Ok(sampler::sample(&items, 1).into_iter().next())
    }

    async fn cold_start(&self, top_n: usize) -> AppResult<Vec<ScoredItem>> {
        let items = self.catalog.all_items().await?;
        Ok(sampler::sample(&items, top_n)
            .into_iter()
            .map(|item| ScoredItem { item, score: None })
            .collect())
    }

    /// Selected names followed by each known liked item's live feature blob
    async fn query_text(&self, query: &RecommendationQuery) -> AppResult<String> {
        let mut text = query
            .genres
            .iter()
            .chain(&query.actors)
            .chain(&query.directors)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        for item_id in &query.liked_ids {
            match self.catalog.get_item(*item_id).await? {
                Some(item) => {
                    text.push(' ');
                    text.push_str(&feature_blob(&item));
                }
                None => tracing::debug!(item_id, "Liked item not in catalog, skipping"),
            }
        }

        Ok(text)
    }
}

/// Scores `query_text` against every row and returns the best `top_n`
///
/// Disliked ids get [`DISLIKED_SCORE`]. The sort is stable, so equal scores
/// keep catalog order. Anything not strictly positive is dropped after the
/// cut, which can leave fewer than `top_n` entries.
pub fn rank(
    space: &VectorSpace,
    query_text: &str,
    disliked: &[ItemId],
    top_n: usize,
) -> Vec<(ItemId, f64)> {
    let disliked: HashSet<ItemId> = disliked.iter().copied().collect();

    let mut scored: Vec<(ItemId, f64)> = space
        .item_ids()
        .iter()
        .copied()
        .zip(space.similarities(query_text))
        .map(|(id, score)| {
            if disliked.contains(&id) {
                (id, DISLIKED_SCORE)
            } else {
                (id, score)
            }
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_n);
    scored.retain(|(_, score)| *score > 0.0);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::MockCatalogRepository;
    use crate::db::model_store::MockModelStore;
    use crate::db::{InMemoryCatalogRepository, MemoryModelStore, ModelStore};

    fn items() -> Vec<CatalogItem> {
        vec![
            CatalogItem::movie(1, "Die Hard", &["Action", "Thriller"], &["Bruce Willis"], &["John McTiernan"]),
            CatalogItem::movie(2, "Airplane", &["Comedy"], &["Leslie Nielsen"], &["Jim Abrahams"]),
            CatalogItem::series(3, "24", &["Action", "Drama"], &["Kiefer Sutherland"]),
        ]
    }

    fn fitted() -> VectorSpace {
        VectorSpace::fit(&items(), TokenizerOptions::default())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_rank_orders_by_similarity() {
        let ranked = rank(&fitted(), "Action Thriller", &[], 3);
        let ids: Vec<ItemId> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn test_rank_excludes_disliked() {
        let ranked = rank(&fitted(), "Action Thriller", &[1], 3);
        assert!(ranked.iter().all(|(id, _)| *id != 1));
    }

    #[test]
    fn test_rank_ties_keep_catalog_order() {
        let space = VectorSpace::fit(
            &[
                CatalogItem::series(7, "A", &["Western"], &[]),
                CatalogItem::series(4, "B", &["Western"], &[]),
                CatalogItem::series(9, "C", &["Western"], &[]),
            ],
            TokenizerOptions::default(),
        )
        .unwrap()
        .unwrap();
        let ids: Vec<ItemId> = rank(&space, "Western", &[], 3)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![7, 4, 9]);
    }

    #[test]
    fn test_rank_truncates_before_filtering() {
        let ranked = rank(&fitted(), "Comedy", &[], 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, 2);
        assert!(rank(&fitted(), "Comedy", &[], 0).is_empty());
    }

    #[tokio::test]
    async fn test_fit_on_empty_catalog_writes_nothing() {
        let mut catalog = MockCatalogRepository::new();
        catalog.expect_all_items().returning(|| Ok(Vec::new()));
        let mut store = MockModelStore::new();
        store.expect_write().times(0);

        let recommender = Recommender::new(
            Arc::new(catalog),
            ModelCache::new(Arc::new(store)),
            TokenizerOptions::default(),
        );
        assert!(recommender.fit().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_refit() {
        let store = Arc::new(MemoryModelStore::new());
        let cache = ModelCache::new(store.clone());
        cache.save(&fitted()).await.unwrap();

        // The catalog only serves item lookups; a refit would call all_items
        let mut catalog = MockCatalogRepository::new();
        catalog.expect_all_items().times(0);
        catalog
            .expect_get_item()
            .returning(|id| Ok(items().into_iter().find(|item| item.id == id)));

        let recommender = Recommender::new(Arc::new(catalog), cache, TokenizerOptions::default());
        let query = RecommendationQuery::default().with_genres(&["Comedy"]);
        let results = recommender.recommend(&query, 5).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].item.id, 2);
        assert!(store.read().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_liked_items_feed_the_query() {
        let recommender = Recommender::new(
            Arc::new(InMemoryCatalogRepository::with_items(items())),
            ModelCache::new(Arc::new(MemoryModelStore::new())),
            TokenizerOptions::default(),
        );
        let query = RecommendationQuery::default().with_liked(&[3, 404]);
        let results = recommender.recommend(&query, 5).await.unwrap();

        let ids: Vec<ItemId> = results.iter().map(|r| r.item.id).collect();
        assert_eq!(ids.first(), Some(&3));
        assert!(ids.contains(&1));
        assert!(!ids.contains(&2));
    }

    #[tokio::test]
    async fn test_out_of_vocabulary_query_is_empty_not_random() {
        let recommender = Recommender::new(
            Arc::new(InMemoryCatalogRepository::with_items(items())),
            ModelCache::new(Arc::new(MemoryModelStore::new())),
            TokenizerOptions::default(),
        );
        let query = RecommendationQuery::default().with_genres(&["Documentary"]);
        assert!(recommender.recommend(&query, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_random_pick() {
        let recommender = Recommender::new(
            Arc::new(InMemoryCatalogRepository::with_items(items())),
            ModelCache::new(Arc::new(MemoryModelStore::new())),
            TokenizerOptions::default(),
        );
        let pick = recommender.random_pick().await.unwrap().unwrap();
        assert!((1..=3).contains(&pick.id));

        let empty = Recommender::new(
            Arc::new(InMemoryCatalogRepository::new()),
            ModelCache::new(Arc::new(MemoryModelStore::new())),
            TokenizerOptions::default(),
        );
        assert!(empty.random_pick().await.unwrap().is_none());
    }
}
