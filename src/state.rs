use std::sync::Arc;

use crate::config::{CacheBackend, Config};
use crate::db::{
    self, CatalogRepository, FileModelStore, InMemoryCatalogRepository,
    InMemoryInteractionRepository, InMemoryPreferenceRepository, InMemoryRankingRepository,
    InteractionRepository, MemoryModelStore, ModelStore, PgCatalogRepository,
    PgInteractionRepository, PgPreferenceRepository, PgRankingRepository, PreferenceRepository,
    RankingRepository, RedisModelStore,
};
use crate::error::AppResult;
use crate::models::{ItemId, RecommendationQuery, ScoredItem, UserId};
use crate::services::{
    train_and_save_model, CatalogService, ModelCache, PreferenceService, PreferenceVectorizer,
    RecommendationService, Recommender, TokenizerOptions, TrainingReport, VectorSpace,
};

/// Shared application state
///
/// Wires the repositories and the model cache into the recommendation
/// services. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub preferences: Arc<dyn PreferenceRepository>,
    pub recommender: Arc<Recommender>,
    pub fingerprints: Arc<PreferenceVectorizer>,
    pub catalog_service: Arc<CatalogService>,
    pub preference_service: Arc<PreferenceService>,
    pub recommendation_service: Arc<RecommendationService>,
    pub recommendation_count: usize,
}

impl AppState {
    /// Builds state from explicit collaborators
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        preferences: Arc<dyn PreferenceRepository>,
        rankings: Arc<dyn RankingRepository>,
        interactions: Arc<dyn InteractionRepository>,
        model_store: Arc<dyn ModelStore>,
        options: TokenizerOptions,
        recommendation_count: usize,
    ) -> Self {
        let cache = ModelCache::new(model_store);
        let recommender = Arc::new(Recommender::new(catalog.clone(), cache.clone(), options));
        let fingerprints = Arc::new(PreferenceVectorizer::new(
            catalog.clone(),
            preferences.clone(),
            options,
        ));

        Self {
            catalog_service: Arc::new(CatalogService::new(catalog.clone(), cache)),
            preference_service: Arc::new(PreferenceService::new(
                catalog.clone(),
                preferences.clone(),
                interactions,
                fingerprints.clone(),
            )),
            recommendation_service: Arc::new(RecommendationService::new(
                recommender.clone(),
                catalog.clone(),
                rankings,
            )),
            catalog,
            preferences,
            recommender,
            fingerprints,
            recommendation_count,
        }
    }

    /// Everything in process memory
    pub fn in_memory(options: TokenizerOptions, recommendation_count: usize) -> Self {
        Self::new(
            Arc::new(InMemoryCatalogRepository::new()),
            Arc::new(InMemoryPreferenceRepository::new()),
            Arc::new(InMemoryRankingRepository::new()),
            Arc::new(InMemoryInteractionRepository::new()),
            Arc::new(MemoryModelStore::new()),
            options,
            recommendation_count,
        )
    }

    /// PostgreSQL repositories plus the configured model cache backend
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = db::create_pool(&config.database_url).await?;
        db::run_migrations(&pool).await?;

        let model_store: Arc<dyn ModelStore> = match config.model_cache_backend {
            CacheBackend::File => {
                let store = FileModelStore::new(&config.model_cache_path);
                tracing::info!(path = %store.path().display(), "Model artifact location");
                Arc::new(store)
            }
            CacheBackend::Redis => {
                let client = db::create_redis_client(&config.redis_url)?;
                Arc::new(RedisModelStore::connect(client, config.redis_cache_key()).await?)
            }
            CacheBackend::Memory => Arc::new(MemoryModelStore::new()),
        };
        tracing::info!(backend = model_store.name(), "Model cache configured");

        Ok(Self::new(
            Arc::new(PgCatalogRepository::new(pool.clone())),
            Arc::new(PgPreferenceRepository::new(pool.clone())),
            Arc::new(PgRankingRepository::new(pool.clone())),
            Arc::new(PgInteractionRepository::new(pool)),
            model_store,
            config.tokenizer_options(),
            config.recommendation_count,
        ))
    }

    /// Rebuilds and caches the catalog vector space
    pub async fn fit(&self) -> AppResult<Option<VectorSpace>> {
        self.recommender.fit().await
    }

    /// Ranked items for ad-hoc selections
    pub async fn recommend(
        &self,
        genres: &[String],
        actors: &[String],
        directors: &[String],
        liked_ids: &[ItemId],
        disliked_ids: &[ItemId],
        top_n: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        let query = RecommendationQuery {
            genres: genres.to_vec(),
            actors: actors.to_vec(),
            directors: directors.to_vec(),
            liked_ids: liked_ids.to_vec(),
            disliked_ids: disliked_ids.to_vec(),
        };
        self.recommender.recommend(&query, top_n).await
    }

    /// Ranks and stores recommendations seeded from the user's own likes
    ///
    /// Returns `recommendation_count` items at most. A user with no likes
    /// gets random picks.
    pub async fn recommend_for_user(&self, user_id: UserId) -> AppResult<Vec<ScoredItem>> {
        let preferences = self.preferences.get_or_create(user_id).await?;
        let query = RecommendationQuery::from_preferences(&preferences);
        self.recommendation_service
            .generate_for_user(user_id, &query, self.recommendation_count)
            .await
    }

    /// Recomputes a user's fingerprint, `None` when re-entered from a running one
    pub async fn generate_fingerprint(&self, user_id: UserId) -> AppResult<Option<Vec<f64>>> {
        self.fingerprints.generate(user_id).await
    }

    pub async fn invalidate_cache(&self) -> AppResult<()> {
        self.recommender.invalidate_cache().await
    }

    /// Full refit plus fingerprint refresh for every user
    pub async fn train(&self) -> AppResult<TrainingReport> {
        train_and_save_model(&self.recommender, &self.fingerprints, self.preferences.clone()).await
    }
}
