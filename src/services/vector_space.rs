use super::features::feature_blob;
use super::vectorizer::{cosine_similarity, SparseVector, TfIdfVectorizer, TokenizerOptions};
use crate::error::{AppError, AppResult};
use crate::models::{CatalogItem, ItemId};

/// Fitted catalog-wide feature space
///
/// Row `i` of the document matrix belongs to `item_ids[i]`. The fields are
/// private so the two can only be built together.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSpace {
    vectorizer: TfIdfVectorizer,
    vectors: Vec<SparseVector>,
    item_ids: Vec<ItemId>,
}

impl VectorSpace {
    /// Fits a space over `items` in the given order
    ///
    /// Returns `Ok(None)` for an empty catalog. Items with an empty feature
    /// blob still get a (zero) row.
    pub fn fit(items: &[CatalogItem], options: TokenizerOptions) -> AppResult<Option<Self>> {
        if items.is_empty() {
            return Ok(None);
        }

        let blobs: Vec<String> = items.iter().map(feature_blob).collect();
        let item_ids = items.iter().map(|item| item.id).collect();
        let (vectorizer, vectors) = TfIdfVectorizer::fit_transform(&blobs, options)?;

        Ok(Some(Self {
            vectorizer,
            vectors,
            item_ids,
        }))
    }

    /// Reassembles a space from its parts, checking row/id alignment
    pub fn from_parts(
        vectorizer: TfIdfVectorizer,
        vectors: Vec<SparseVector>,
        item_ids: Vec<ItemId>,
    ) -> AppResult<Self> {
        if vectors.len() != item_ids.len() {
            return Err(AppError::Internal(format!(
                "vector space has {} rows but {} item ids",
                vectors.len(),
                item_ids.len()
            )));
        }
        if !vectorizer.is_consistent() || !vectors.iter().all(|row| vectorizer.covers(row)) {
            return Err(AppError::Internal(
                "vector space rows do not match the vocabulary".to_string(),
            ));
        }
        Ok(Self {
            vectorizer,
            vectors,
            item_ids,
        })
    }

    pub fn into_parts(self) -> (TfIdfVectorizer, Vec<SparseVector>, Vec<ItemId>) {
        (self.vectorizer, self.vectors, self.item_ids)
    }

    pub fn vectorizer(&self) -> &TfIdfVectorizer {
        &self.vectorizer
    }

    pub fn vectors(&self) -> &[SparseVector] {
        &self.vectors
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Cosine similarity of `query` against every row, in row order
    pub fn similarities(&self, query: &str) -> Vec<f64> {
        let query = self.vectorizer.transform(query);
        self.vectors
            .iter()
            .map(|row| cosine_similarity(&query, row))
            .collect()
    }
}
