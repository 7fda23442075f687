use serde::{Deserialize, Serialize};

use super::ItemId;

/// Account identifier owned by the user-management layer
pub type UserId = i64;

/// A user's stored preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserPreferences {
    pub user_id: UserId,
    /// Liked ("favorite") catalog items
    pub liked: Vec<ItemId>,
    /// Disliked catalog items, never recommended
    pub disliked: Vec<ItemId>,
    /// Averaged TF-IDF vector over the liked items, empty when nothing is liked
    pub fingerprint: Vec<f64>,
}

impl UserPreferences {
    /// Creates empty preferences for a user
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Adds a liked item, returns false if it was already liked
    pub fn add_liked(&mut self, item_id: ItemId) -> bool {
        add_unique(&mut self.liked, item_id)
    }

    /// Removes a liked item, returns false if it was not liked
    pub fn remove_liked(&mut self, item_id: ItemId) -> bool {
        remove(&mut self.liked, item_id)
    }

    /// Adds a disliked item, returns false if it was already disliked
    pub fn add_disliked(&mut self, item_id: ItemId) -> bool {
        add_unique(&mut self.disliked, item_id)
    }

    /// Removes a disliked item, returns false if it was not disliked
    pub fn remove_disliked(&mut self, item_id: ItemId) -> bool {
        remove(&mut self.disliked, item_id)
    }
}

fn add_unique(ids: &mut Vec<ItemId>, item_id: ItemId) -> bool {
    if ids.contains(&item_id) {
        return false;
    }
    ids.push(item_id);
    true
}

fn remove(ids: &mut Vec<ItemId>, item_id: ItemId) -> bool {
    let before = ids.len();
    ids.retain(|id| *id != item_id);
    ids.len() != before
}

/// Input to a single recommendation request
///
/// Names are matched against the catalog vocabulary as given. Liked ids
/// contribute their items' attributes to the query; disliked ids are
/// excluded from the result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecommendationQuery {
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub liked_ids: Vec<ItemId>,
    #[serde(default)]
    pub disliked_ids: Vec<ItemId>,
}

impl RecommendationQuery {
    /// Query seeded from a user's stored likes and dislikes
    pub fn from_preferences(preferences: &UserPreferences) -> Self {
        Self {
            liked_ids: preferences.liked.clone(),
            disliked_ids: preferences.disliked.clone(),
            ..Default::default()
        }
    }

    pub fn with_genres(mut self, genres: &[&str]) -> Self {
        self.genres = genres.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn with_liked(mut self, ids: &[ItemId]) -> Self {
        self.liked_ids = ids.to_vec();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_preferences() {
        let prefs = UserPreferences::new(3);
        assert_eq!(prefs.user_id, 3);
        assert!(prefs.liked.is_empty());
        assert!(prefs.disliked.is_empty());
        assert!(prefs.fingerprint.is_empty());
    }

    #[test]
    fn test_add_liked_ignores_duplicates() {
        let mut prefs = UserPreferences::new(1);
        assert!(prefs.add_liked(10));
        assert!(!prefs.add_liked(10));
        assert_eq!(prefs.liked, vec![10]);
    }

    #[test]
    fn test_remove_disliked() {
        let mut prefs = UserPreferences::new(1);
        prefs.add_disliked(4);
        assert!(prefs.remove_disliked(4));
        assert!(!prefs.remove_disliked(4));
    }

    #[test]
    fn test_query_from_json_defaults_missing_fields() {
        let query: RecommendationQuery = serde_json::from_str(r#"{"genres":["Action"]}"#).unwrap();
        assert_eq!(query.genres, vec!["Action".to_string()]);
        assert!(query.liked_ids.is_empty());
    }

    #[test]
    fn test_query_from_preferences_carries_likes_and_dislikes() {
        let mut prefs = UserPreferences::new(1);
        prefs.add_liked(603);
        prefs.add_disliked(604);

        let query = RecommendationQuery::from_preferences(&prefs);
        assert_eq!(query.liked_ids, vec![603]);
        assert_eq!(query.disliked_ids, vec![604]);
        assert!(query.genres.is_empty());
    }
}
