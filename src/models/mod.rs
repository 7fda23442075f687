pub mod content;
pub mod interaction;
pub mod recommendation;
pub mod user_preferences;

pub use content::{CatalogItem, ContentKind, ItemId};
pub use interaction::{InteractionKind, UserInteraction, MAX_RATING};
pub use recommendation::{RankedRecommendation, ScoredItem};
pub use user_preferences::{RecommendationQuery, UserId, UserPreferences};
