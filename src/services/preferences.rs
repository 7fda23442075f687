use std::sync::Arc;

use super::fingerprint::PreferenceVectorizer;
use crate::db::{CatalogRepository, InteractionRepository, PreferenceRepository};
use crate::error::{AppError, AppResult};
use crate::models::{
    CatalogItem, InteractionKind, ItemId, UserId, UserInteraction, UserPreferences,
};

/// User preference write path
///
/// Every write of a preference record is followed by an explicit
/// fingerprint recompute. Favorites also keep a `like` interaction in step.
pub struct PreferenceService {
    catalog: Arc<dyn CatalogRepository>,
    preferences: Arc<dyn PreferenceRepository>,
    interactions: Arc<dyn InteractionRepository>,
    vectorizer: Arc<PreferenceVectorizer>,
}

impl PreferenceService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        preferences: Arc<dyn PreferenceRepository>,
        interactions: Arc<dyn InteractionRepository>,
        vectorizer: Arc<PreferenceVectorizer>,
    ) -> Self {
        Self {
            catalog,
            preferences,
            interactions,
            vectorizer,
        }
    }

    pub async fn get(&self, user_id: UserId) -> AppResult<UserPreferences> {
        self.preferences.get_or_create(user_id).await
    }

    /// Saves the full record, then recomputes the fingerprint
    pub async fn save(&self, preferences: &UserPreferences) -> AppResult<UserPreferences> {
        self.preferences.save(preferences).await?;
        self.vectorizer.generate(preferences.user_id).await?;
        self.preferences.get_or_create(preferences.user_id).await
    }

    /// Adds an item to the user's favorites
    pub async fn add_favorite(&self, user_id: UserId, item_id: ItemId) -> AppResult<UserPreferences> {
        self.require_item(item_id).await?;
        let mut preferences = self.get(user_id).await?;
        if !preferences.add_liked(item_id) {
            return Err(AppError::InvalidInput(format!(
                "content {} is already in favorites",
                item_id
            )));
        }
        tracing::info!(user_id, item_id, "Favorite added");
        let saved = self.save(&preferences).await?;
        self.interactions
            .record(&UserInteraction::new(user_id, item_id, InteractionKind::Like))
            .await?;
        Ok(saved)
    }

    /// Removes an item from the user's favorites
    pub async fn remove_favorite(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> AppResult<UserPreferences> {
        self.require_item(item_id).await?;
        let mut preferences = self.get(user_id).await?;
        if !preferences.remove_liked(item_id) {
            return Err(AppError::InvalidInput(format!(
                "content {} is not in favorites",
                item_id
            )));
        }
        tracing::info!(user_id, item_id, "Favorite removed");
        let saved = self.save(&preferences).await?;
        self.interactions
            .remove(user_id, item_id, InteractionKind::Like)
            .await?;
        Ok(saved)
    }

    pub async fn add_dislike(&self, user_id: UserId, item_id: ItemId) -> AppResult<UserPreferences> {
        self.require_item(item_id).await?;
        let mut preferences = self.get(user_id).await?;
        if !preferences.add_disliked(item_id) {
            return Err(AppError::InvalidInput(format!(
                "content {} is already disliked",
                item_id
            )));
        }
        self.save(&preferences).await
    }

    pub async fn remove_dislike(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> AppResult<UserPreferences> {
        let mut preferences = self.get(user_id).await?;
        if !preferences.remove_disliked(item_id) {
            return Err(AppError::InvalidInput(format!(
                "content {} is not disliked",
                item_id
            )));
        }
        self.save(&preferences).await
    }

    /// Records an interaction with an existing item
    ///
    /// Ratings must lie in [0, 10]. Returns false when the same kind of
    /// interaction was already recorded for the item.
    pub async fn record_interaction(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionKind,
        rating: Option<i32>,
    ) -> AppResult<bool> {
        let interaction = UserInteraction {
            rating,
            ..UserInteraction::new(user_id, item_id, kind)
        };
        interaction.validate()?;
        self.require_item(item_id).await?;

        let created = self.interactions.record(&interaction).await?;
        tracing::debug!(user_id, item_id, kind = %kind, created, "Interaction recorded");
        Ok(created)
    }

    /// The user's recorded interactions, oldest first
    pub async fn interactions(&self, user_id: UserId) -> AppResult<Vec<UserInteraction>> {
        self.interactions.list_for_user(user_id).await
    }

    /// The user's favorite items that still exist in the catalog
    pub async fn favorites(&self, user_id: UserId) -> AppResult<Vec<CatalogItem>> {
        let preferences = self.get(user_id).await?;
        let mut items = Vec::with_capacity(preferences.liked.len());
        for item_id in preferences.liked {
            if let Some(item) = self.catalog.get_item(item_id).await? {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn require_item(&self, item_id: ItemId) -> AppResult<()> {
        match self.catalog.get_item(item_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("content {}", item_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::interactions::MockInteractionRepository;
    use crate::db::{
        InMemoryCatalogRepository, InMemoryInteractionRepository, InMemoryPreferenceRepository,
    };
    use crate::services::vectorizer::TokenizerOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn service_with(
        preferences: Arc<dyn PreferenceRepository>,
        interactions: Arc<dyn InteractionRepository>,
    ) -> PreferenceService {
        let catalog: Arc<dyn CatalogRepository> =
            Arc::new(InMemoryCatalogRepository::with_items(vec![
                CatalogItem::movie(155, "The Dark Knight", &["Action", "Crime"], &["Christian Bale"], &["Christopher Nolan"]),
                CatalogItem::movie(680, "Pulp Fiction", &["Crime"], &["John Travolta"], &["Quentin Tarantino"]),
            ]));
        let vectorizer = Arc::new(PreferenceVectorizer::new(
            catalog.clone(),
            preferences.clone(),
            TokenizerOptions::default(),
        ));
        PreferenceService::new(catalog, preferences, interactions, vectorizer)
    }

    fn service() -> PreferenceService {
        service_with(
            Arc::new(InMemoryPreferenceRepository::new()),
            Arc::new(InMemoryInteractionRepository::new()),
        )
    }

    /// Holds the first fingerprint write until released
    #[derive(Default)]
    struct StallingPreferences {
        inner: InMemoryPreferenceRepository,
        writes: AtomicUsize,
        stalled: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl PreferenceRepository for StallingPreferences {
        async fn get_or_create(&self, user_id: UserId) -> AppResult<UserPreferences> {
            self.inner.get_or_create(user_id).await
        }

        async fn user_ids(&self) -> AppResult<Vec<UserId>> {
            self.inner.user_ids().await
        }

        async fn save(&self, preferences: &UserPreferences) -> AppResult<()> {
            self.inner.save(preferences).await
        }

        async fn set_fingerprint(&self, user_id: UserId, fingerprint: &[f64]) -> AppResult<()> {
            if self.writes.fetch_add(1, Ordering::SeqCst) == 0 {
                self.stalled.notify_one();
                self.release.notified().await;
            }
            self.inner.set_fingerprint(user_id, fingerprint).await
        }
    }

    #[tokio::test]
    async fn test_add_favorite_recomputes_fingerprint() {
        let service = service();
        let prefs = service.add_favorite(1, 155).await.unwrap();
        assert_eq!(prefs.liked, vec![155]);
        // action, crime, christian, bale, christopher, nolan
        assert_eq!(prefs.fingerprint.len(), 6);

        let prefs = service.remove_favorite(1, 155).await.unwrap();
        assert!(prefs.liked.is_empty());
        assert!(prefs.fingerprint.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_favorites_both_reach_fingerprint() {
        let prefs = Arc::new(StallingPreferences::default());
        let service = service_with(
            prefs.clone(),
            Arc::new(InMemoryInteractionRepository::new()),
        );

        let second = async {
            prefs.stalled.notified().await;
            let (result, _) = tokio::join!(service.add_favorite(1, 680), async {
                for _ in 0..16 {
                    tokio::task::yield_now().await;
                }
                prefs.release.notify_one();
            });
            result
        };
        let (first, second) = tokio::join!(service.add_favorite(1, 155), second);
        first.unwrap();
        let second = second.unwrap();

        // action, crime, christian, bale, christopher, nolan,
        // john, travolta, quentin, tarantino
        assert_eq!(second.liked, vec![155, 680]);
        assert_eq!(second.fingerprint.len(), 10);
        assert_eq!(service.get(1).await.unwrap().fingerprint.len(), 10);
    }

    #[tokio::test]
    async fn test_favorites_keep_like_interaction_in_step() {
        let service = service();
        service.add_favorite(1, 155).await.unwrap();

        let interactions = service.interactions(1).await.unwrap();
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].item_id, 155);
        assert_eq!(interactions[0].kind, InteractionKind::Like);
        assert_eq!(interactions[0].rating, None);

        service.remove_favorite(1, 155).await.unwrap();
        assert!(service.interactions(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_interaction_validates_rating_and_item() {
        let service = service();
        assert!(service
            .record_interaction(1, 680, InteractionKind::Rate, Some(9))
            .await
            .unwrap());
        assert!(!service
            .record_interaction(1, 680, InteractionKind::Rate, Some(7))
            .await
            .unwrap());
        assert!(matches!(
            service
                .record_interaction(1, 680, InteractionKind::Rate, Some(11))
                .await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            service
                .record_interaction(1, 42, InteractionKind::View, None)
                .await,
            Err(AppError::NotFound(_))
        ));

        let stored = service.interactions(1).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rating, Some(9));
    }

    #[tokio::test]
    async fn test_rejected_favorite_records_no_interaction() {
        let mut interactions = MockInteractionRepository::new();
        interactions.expect_record().times(1).returning(|_| Ok(true));
        let service = service_with(
            Arc::new(InMemoryPreferenceRepository::new()),
            Arc::new(interactions),
        );

        service.add_favorite(1, 680).await.unwrap();
        assert!(service.add_favorite(1, 680).await.is_err());
        assert!(service.add_favorite(1, 42).await.is_err());
    }

    #[tokio::test]
    async fn test_add_favorite_twice_is_rejected() {
        let service = service();
        service.add_favorite(1, 680).await.unwrap();
        assert!(matches!(
            service.add_favorite(1, 680).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let service = service();
        assert!(matches!(
            service.add_favorite(1, 42).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.remove_favorite(1, 155).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_dislikes_and_favorites_listing() {
        let service = service();
        service.add_dislike(2, 680).await.unwrap();
        service.add_favorite(2, 155).await.unwrap();

        let prefs = service.get(2).await.unwrap();
        assert_eq!(prefs.disliked, vec![680]);
        let favorites = service.favorites(2).await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].title, "The Dark Knight");

        service.remove_dislike(2, 680).await.unwrap();
        assert!(service.get(2).await.unwrap().disliked.is_empty());
    }
}
