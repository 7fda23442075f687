use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CatalogItem, ItemId, UserId};
use crate::error::{AppError, AppResult};

/// An item returned by the recommender
///
/// `score` is the cosine similarity with the query, or `None` when the item
/// came from the cold-start sampler.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredItem {
    pub item: CatalogItem,
    pub score: Option<f64>,
}

/// A persisted recommendation, unique per (user, item)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedRecommendation {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

impl RankedRecommendation {
    /// Builds a record from a recommender result, clamping the score to [0, 1]
    pub fn from_scored(user_id: UserId, scored: &ScoredItem) -> Self {
        Self {
            user_id,
            item_id: scored.item.id,
            score: scored.score.unwrap_or(0.0).clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }

    /// Rejects scores outside [0.0, 1.0]
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.score) {
            return Err(AppError::InvalidInput(format!(
                "recommendation score must be between 0.0 and 1.0, got {}",
                self.score
            )));
        }
        Ok(())
    }
}
