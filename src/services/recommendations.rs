use std::sync::Arc;

use super::recommender::Recommender;
use crate::db::{CatalogRepository, RankingRepository};
use crate::error::AppResult;
use crate::models::{ItemId, RankedRecommendation, RecommendationQuery, ScoredItem, UserId};

/// Titles resolved against the catalog
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TitleResolution {
    pub ids: Vec<ItemId>,
    /// Names with no matching title
    pub missing: Vec<String>,
}

/// Generates and stores per-user recommendation lists
pub struct RecommendationService {
    recommender: Arc<Recommender>,
    catalog: Arc<dyn CatalogRepository>,
    rankings: Arc<dyn RankingRepository>,
}

impl RecommendationService {
    pub fn new(
        recommender: Arc<Recommender>,
        catalog: Arc<dyn CatalogRepository>,
        rankings: Arc<dyn RankingRepository>,
    ) -> Self {
        Self {
            recommender,
            catalog,
            rankings,
        }
    }

    /// Replaces the user's stored recommendations with a fresh ranking
    ///
    /// Prior records are cleared first. Scores are stored clamped to
    /// [0, 1]; random picks are stored as 0.0.
    pub async fn generate_for_user(
        &self,
        user_id: UserId,
        query: &RecommendationQuery,
        top_n: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        let results = self.recommender.recommend(query, top_n).await?;

        let records: Vec<RankedRecommendation> = results
            .iter()
            .map(|scored| RankedRecommendation::from_scored(user_id, scored))
            .collect();
        for record in &records {
            record.validate()?;
        }
        self.rankings.replace_for_user(user_id, &records).await?;

        tracing::info!(user_id, stored = records.len(), "Recommendations generated");
        Ok(results)
    }

    /// The user's stored recommendations, best first
    pub async fn stored_for_user(&self, user_id: UserId) -> AppResult<Vec<RankedRecommendation>> {
        self.rankings.list_for_user(user_id).await
    }

    /// Resolves a comma-separated list of titles to catalog ids
    ///
    /// Each name maps to the first item whose title contains it, ignoring
    /// case. Blank entries are skipped.
    pub async fn resolve_titles(&self, input: &str) -> AppResult<TitleResolution> {
        let mut resolution = TitleResolution::default();
        for name in input.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match self.catalog.find_by_title(name).await? {
                Some(item) => resolution.ids.push(item.id),
                None => {
                    tracing::debug!(title = %name, "Title not found in catalog");
                    resolution.missing.push(name.to_string());
                }
            }
        }
        Ok(resolution)
    }
}
