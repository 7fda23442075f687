use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::vector_space::VectorSpace;
use super::vectorizer::{SparseVector, TfIdfVectorizer};
use crate::db::ModelStore;
use crate::error::{AppError, AppResult};
use crate::models::ItemId;

const ARTIFACT_MAGIC: [u8; 4] = *b"CMVS";
const FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct ArtifactRef<'a> {
    version: u16,
    vectorizer: &'a TfIdfVectorizer,
    vectors: &'a [SparseVector],
    item_ids: &'a [ItemId],
}

#[derive(Deserialize)]
struct Artifact {
    version: u16,
    vectorizer: TfIdfVectorizer,
    vectors: Vec<SparseVector>,
    item_ids: Vec<ItemId>,
}

/// Persisted copy of the fitted [`VectorSpace`]
///
/// Wraps a [`ModelStore`] with the artifact codec. A record that fails to
/// decode is deleted and reported as a miss, so a corrupt or outdated
/// artifact heals on the next fit instead of failing every request.
#[derive(Clone)]
pub struct ModelCache {
    store: Arc<dyn ModelStore>,
}

impl ModelCache {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }

    /// Loads the cached space, `None` on a miss
    pub async fn load(&self) -> AppResult<Option<VectorSpace>> {
        let Some(bytes) = self.store.read().await? else {
            tracing::debug!(store = self.store.name(), "Model cache miss");
            return Ok(None);
        };

        match decode(&bytes) {
            Ok(space) => {
                tracing::debug!(
                    store = self.store.name(),
                    items = space.len(),
                    "Model cache hit"
                );
                Ok(Some(space))
            }
            Err(e) => {
                tracing::warn!(
                    store = self.store.name(),
                    error = %e,
                    "Model cache unreadable, deleting artifact"
                );
                if let Err(e) = self.store.delete().await {
                    tracing::warn!(error = %e, "Failed to delete unreadable model artifact");
                }
                Ok(None)
            }
        }
    }

    /// Serializes and stores `space`, replacing any previous artifact
    pub async fn save(&self, space: &VectorSpace) -> AppResult<()> {
        let bytes = encode(space)?;
        self.store.write(&bytes).await?;
        tracing::info!(
            store = self.store.name(),
            items = space.len(),
            vocabulary = space.vectorizer().vocabulary_size(),
            "Model saved to cache"
        );
        Ok(())
    }

    /// Drops the cached artifact; nothing cached is not an error
    pub async fn invalidate(&self) -> AppResult<()> {
        self.store.delete().await?;
        tracing::info!(store = self.store.name(), "Model cache invalidated");
        Ok(())
    }
}

/// Encodes a space as magic bytes followed by the postcard payload
pub fn encode(space: &VectorSpace) -> AppResult<Vec<u8>> {
    let artifact = ArtifactRef {
        version: FORMAT_VERSION,
        vectorizer: space.vectorizer(),
        vectors: space.vectors(),
        item_ids: space.item_ids(),
    };
    let mut bytes = ARTIFACT_MAGIC.to_vec();
    bytes.extend(postcard::to_stdvec(&artifact)?);
    Ok(bytes)
}

/// Decodes an artifact written by [`encode`]
pub fn decode(bytes: &[u8]) -> AppResult<VectorSpace> {
    let payload = bytes
        .strip_prefix(&ARTIFACT_MAGIC[..])
        .ok_or_else(|| AppError::Serialization("missing model artifact header".to_string()))?;

    let artifact: Artifact = postcard::from_bytes(payload)?;
    if artifact.version != FORMAT_VERSION {
        return Err(AppError::Serialization(format!(
            "unsupported model artifact version {}",
            artifact.version
        )));
    }

    VectorSpace::from_parts(artifact.vectorizer, artifact.vectors, artifact.item_ids)
}
