use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// How raw text is split into vocabulary terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerOptions {
    /// Fold terms to lowercase
    pub lowercase: bool,
    /// Shortest token kept, in characters
    pub min_token_len: usize,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            min_token_len: 2,
        }
    }
}

impl TokenizerOptions {
    /// Splits on anything that is not a word character
    pub fn tokenize<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        let min_len = self.min_token_len.max(1);
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(move |token| token.chars().count() >= min_len)
            .map(move |token| {
                if self.lowercase {
                    token.to_lowercase()
                } else {
                    token.to_string()
                }
            })
    }
}

/// Sparse row of a document-term matrix, indices kept sorted
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f64>,
}

impl SparseVector {
    fn from_sorted(entries: BTreeMap<u32, f64>) -> Self {
        let (indices, values) = entries.into_iter().unzip();
        Self { indices, values }
    }

    /// Number of stored (non-zero) entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn get(&self, index: u32) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values.get(pos).copied().unwrap_or(0.0),
            Err(_) => 0.0,
        }
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Expands into a dense vector of `dim` entries
    pub fn to_dense(&self, dim: usize) -> Vec<f64> {
        let mut dense = vec![0.0; dim];
        for (index, value) in self.indices.iter().zip(&self.values) {
            if let Some(slot) = dense.get_mut(*index as usize) {
                *slot = *value;
            }
        }
        dense
    }

    /// Indices strictly increasing, one finite value per index
    fn is_well_formed(&self) -> bool {
        self.indices.len() == self.values.len()
            && self.indices.windows(2).all(|pair| pair[0] < pair[1])
            && self.values.iter().all(|v| v.is_finite())
    }

    fn max_index(&self) -> Option<u32> {
        self.indices.last().copied()
    }
}

/// Cosine similarity, 0.0 when either side is the zero vector
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    a.dot(b) / denom
}

/// Element-wise mean of sparse rows, as a dense vector of `dim` entries
pub fn mean_dense(rows: &[SparseVector], dim: usize) -> Vec<f64> {
    if rows.is_empty() {
        return Vec::new();
    }
    let mut mean = vec![0.0; dim];
    for row in rows {
        for (index, value) in row.indices.iter().zip(&row.values) {
            if let Some(slot) = mean.get_mut(*index as usize) {
                *slot += *value;
            }
        }
    }
    let n = rows.len() as f64;
    mean.iter_mut().for_each(|v| *v /= n);
    mean
}

/// TF-IDF vectorizer with smoothed idf and l2-normalized rows
///
/// Term frequency is the raw count, `idf = ln((1 + n) / (1 + df)) + 1`.
/// The vocabulary keeps every term seen during fitting (no document
/// frequency cut-off, no stemming) and is indexed in sorted term order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    options: TokenizerOptions,
    vocabulary: BTreeMap<String, u32>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    /// Learns vocabulary and idf weights from `documents`
    pub fn fit<S: AsRef<str>>(documents: &[S], options: TokenizerOptions) -> AppResult<Self> {
        if documents.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot fit a vectorizer on zero documents".to_string(),
            ));
        }

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            let unique: BTreeSet<String> = options.tokenize(doc.as_ref()).collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| AppError::Internal("vocabulary exceeds u32 range".to_string()))?;
            vocabulary.insert(term, index);
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
        }

        Ok(Self {
            options,
            vocabulary,
            idf,
        })
    }

    /// Fits on `documents` and returns one row per document, in order
    pub fn fit_transform<S: AsRef<str>>(
        documents: &[S],
        options: TokenizerOptions,
    ) -> AppResult<(Self, Vec<SparseVector>)> {
        let vectorizer = Self::fit(documents, options)?;
        let rows = documents
            .iter()
            .map(|doc| vectorizer.transform(doc.as_ref()))
            .collect();
        Ok((vectorizer, rows))
    }

    /// Projects text into the fitted space; unknown terms are ignored
    pub fn transform(&self, text: &str) -> SparseVector {
        // Each occurrence adds its idf weight, i.e. count * idf
        let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
        for term in self.options.tokenize(text) {
            let Some(index) = self.vocabulary.get(&term).copied() else {
                continue;
            };
            if let Some(weight) = self.idf.get(index as usize) {
                *counts.entry(index).or_insert(0.0) += *weight;
            }
        }

        let norm = counts.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            counts.values_mut().for_each(|v| *v /= norm);
        }

        SparseVector::from_sorted(counts)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn term_index(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    /// True when `row` is well formed and only references terms of this vocabulary
    pub(crate) fn covers(&self, row: &SparseVector) -> bool {
        row.is_well_formed()
            && row
                .max_index()
                .map_or(true, |index| (index as usize) < self.idf.len())
    }

    /// True when every vocabulary term owns a distinct idf slot
    ///
    /// Holds for anything built by [`TfIdfVectorizer::fit`]; a decoded
    /// artifact can break it.
    pub(crate) fn is_consistent(&self) -> bool {
        if self.vocabulary.len() != self.idf.len() {
            return false;
        }
        let mut seen = vec![false; self.idf.len()];
        for index in self.vocabulary.values() {
            match seen.get_mut(*index as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        self.idf.iter().all(|weight| weight.is_finite())
    }
}
