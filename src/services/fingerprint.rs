use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

use super::features::feature_blob;
use super::vectorizer::{mean_dense, TfIdfVectorizer, TokenizerOptions};
use crate::db::{CatalogRepository, PreferenceRepository};
use crate::error::AppResult;
use crate::models::UserId;

tokio::task_local! {
    /// Users whose recompute is running further up the current call chain
    static GENERATING: HashSet<UserId>;
}

type UserLocks = Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>;

/// Computes per-user preference fingerprints
///
/// A fingerprint is the mean TF-IDF vector of the user's liked items, fitted
/// on those items alone. It is independent of the catalog-wide space and its
/// length is the size of that local vocabulary.
///
/// Recomputes for one user run one at a time, each reading the liked set
/// when it starts, so the last writer's likes always reach the fingerprint.
/// A recompute triggered from inside a running one for the same user is
/// skipped.
pub struct PreferenceVectorizer {
    catalog: Arc<dyn CatalogRepository>,
    preferences: Arc<dyn PreferenceRepository>,
    options: TokenizerOptions,
    user_locks: UserLocks,
}

/// Exclusive recompute slot for one user, pruned once nobody waits on it
struct UserSlot<'a> {
    locks: &'a UserLocks,
    user_id: UserId,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserSlot<'_> {
    fn drop(&mut self) {
        self.permit.take();
        let mut locks = lock(self.locks);
        if locks
            .get(&self.user_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}

fn lock(locks: &UserLocks) -> MutexGuard<'_, HashMap<UserId, Arc<tokio::sync::Mutex<()>>>> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PreferenceVectorizer {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        preferences: Arc<dyn PreferenceRepository>,
        options: TokenizerOptions,
    ) -> Self {
        Self {
            catalog,
            preferences,
            options,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, user_id: UserId) -> UserSlot<'_> {
        let slot = lock(&self.user_locks).entry(user_id).or_default().clone();
        let permit = slot.lock_owned().await;
        UserSlot {
            locks: &self.user_locks,
            user_id,
            permit: Some(permit),
        }
    }

    /// True while a recompute for `user_id` is running or queued
    #[cfg(test)]
    fn is_generating(&self, user_id: UserId) -> bool {
        lock(&self.user_locks).contains_key(&user_id)
    }

    /// Recomputes and stores the user's fingerprint
    ///
    /// Waits for any recompute of the same user started elsewhere. Returns
    /// `None` without doing anything when called from inside a recompute of
    /// the same user. Only the fingerprint column is written.
    pub async fn generate(&self, user_id: UserId) -> AppResult<Option<Vec<f64>>> {
        let mut active = GENERATING
            .try_with(|users| users.clone())
            .unwrap_or_default();
        if !active.insert(user_id) {
            tracing::debug!(user_id, "Fingerprint recompute re-entered, skipping");
            return Ok(None);
        }

        let _slot = self.acquire(user_id).await;
        GENERATING
            .scope(active, self.recompute(user_id))
            .await
            .map(Some)
    }

    async fn recompute(&self, user_id: UserId) -> AppResult<Vec<f64>> {
        let preferences = self.preferences.get_or_create(user_id).await?;

        let mut blobs = Vec::with_capacity(preferences.liked.len());
        for item_id in &preferences.liked {
            if let Some(item) = self.catalog.get_item(*item_id).await? {
                blobs.push(feature_blob(&item));
            }
        }

        let fingerprint = fingerprint_from_blobs(&blobs, self.options)?;
        self.preferences
            .set_fingerprint(user_id, &fingerprint)
            .await?;

        tracing::debug!(
            user_id,
            liked = blobs.len(),
            dimensions = fingerprint.len(),
            "Fingerprint updated"
        );
        Ok(fingerprint)
    }
}

/// Mean of the local TF-IDF rows of `blobs`, empty for no blobs
pub fn fingerprint_from_blobs(blobs: &[String], options: TokenizerOptions) -> AppResult<Vec<f64>> {
    if blobs.is_empty() {
        return Ok(Vec::new());
    }
    let (vectorizer, rows) = TfIdfVectorizer::fit_transform(blobs, options)?;
    Ok(mean_dense(&rows, vectorizer.vocabulary_size()))
}
