use std::sync::Arc;

use super::fingerprint::PreferenceVectorizer;
use super::recommender::Recommender;
use crate::db::PreferenceRepository;
use crate::error::AppResult;

/// Outcome of a full training run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrainingReport {
    /// Items in the fitted space, 0 when the catalog was empty
    pub items: usize,
    pub vocabulary: usize,
    /// Users whose fingerprint was recomputed
    pub users: usize,
}

/// Refits the catalog model and recomputes every user's fingerprint
///
/// Meant to run out-of-band (a scheduled job or the `train` command) so
/// request paths find a warm cache.
pub async fn train_and_save_model(
    recommender: &Recommender,
    vectorizer: &PreferenceVectorizer,
    preferences: Arc<dyn PreferenceRepository>,
) -> AppResult<TrainingReport> {
    let mut report = TrainingReport::default();

    if let Some(space) = recommender.fit().await? {
        report.items = space.len();
        report.vocabulary = space.vectorizer().vocabulary_size();
    }

    for user_id in preferences.user_ids().await? {
        if vectorizer.generate(user_id).await?.is_some() {
            report.users += 1;
        }
    }

    tracing::info!(
        items = report.items,
        vocabulary = report.vocabulary,
        users = report.users,
        "Training complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        CatalogRepository, InMemoryCatalogRepository, InMemoryPreferenceRepository,
        MemoryModelStore, ModelStore,
    };
    use crate::models::{CatalogItem, UserPreferences};
    use crate::services::model_cache::ModelCache;
    use crate::services::vectorizer::TokenizerOptions;

    #[tokio::test]
    async fn test_training_fits_and_refreshes_users() {
        let catalog: Arc<dyn CatalogRepository> =
            Arc::new(InMemoryCatalogRepository::with_items(vec![
                CatalogItem::movie(278, "The Shawshank Redemption", &["Drama"], &["Tim Robbins"], &["Frank Darabont"]),
                CatalogItem::series(60574, "Peaky Blinders", &["Crime", "Drama"], &["Cillian Murphy"]),
            ]));
        let store = Arc::new(MemoryModelStore::new());
        let recommender = Recommender::new(
            catalog.clone(),
            ModelCache::new(store.clone()),
            TokenizerOptions::default(),
        );

        let preferences = Arc::new(InMemoryPreferenceRepository::new());
        let mut fan = UserPreferences::new(1);
        fan.add_liked(60574);
        preferences.save(&fan).await.unwrap();
        preferences.save(&UserPreferences::new(2)).await.unwrap();

        let vectorizer =
            PreferenceVectorizer::new(catalog, preferences.clone(), TokenizerOptions::default());

        let report = train_and_save_model(&recommender, &vectorizer, preferences.clone())
            .await
            .unwrap();

        assert_eq!(report.items, 2);
        assert_eq!(report.users, 2);
        assert!(store.read().await.unwrap().is_some());
        // crime, drama, cillian, murphy
        assert_eq!(preferences.get_or_create(1).await.unwrap().fingerprint.len(), 4);
    }

    #[tokio::test]
    async fn test_training_on_empty_catalog() {
        let catalog: Arc<dyn CatalogRepository> = Arc::new(InMemoryCatalogRepository::new());
        let store = Arc::new(MemoryModelStore::new());
        let recommender = Recommender::new(
            catalog.clone(),
            ModelCache::new(store.clone()),
            TokenizerOptions::default(),
        );
        let preferences = Arc::new(InMemoryPreferenceRepository::new());
        let vectorizer =
            PreferenceVectorizer::new(catalog, preferences.clone(), TokenizerOptions::default());

        let report = train_and_save_model(&recommender, &vectorizer, preferences)
            .await
            .unwrap();
        assert_eq!(report, TrainingReport::default());
        assert!(store.read().await.unwrap().is_none());
    }
}
