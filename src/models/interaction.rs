use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{ItemId, UserId};
use crate::error::{AppError, AppResult};

/// Highest rating a user can give
pub const MAX_RATING: i32 = 10;

/// What the user did with a catalog item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    View,
    Like,
    Dislike,
    Rate,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::Dislike => "dislike",
            InteractionKind::Rate => "rate",
        }
    }
}

impl Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(InteractionKind::View),
            "like" => Ok(InteractionKind::Like),
            "dislike" => Ok(InteractionKind::Dislike),
            "rate" => Ok(InteractionKind::Rate),
            other => Err(format!("unknown interaction kind '{}'", other)),
        }
    }
}

/// A recorded user interaction, unique per (user, item, kind)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInteraction {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub kind: InteractionKind,
    /// Only meaningful for ratings, 0 to [`MAX_RATING`]
    pub rating: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

impl UserInteraction {
    pub fn new(user_id: UserId, item_id: ItemId, kind: InteractionKind) -> Self {
        Self {
            user_id,
            item_id,
            kind,
            rating: None,
            recorded_at: Utc::now(),
        }
    }

    /// A `rate` interaction carrying `rating`
    pub fn rated(user_id: UserId, item_id: ItemId, rating: i32) -> Self {
        Self {
            rating: Some(rating),
            ..Self::new(user_id, item_id, InteractionKind::Rate)
        }
    }

    /// Rejects ratings outside [0, MAX_RATING]
    pub fn validate(&self) -> AppResult<()> {
        match self.rating {
            Some(rating) if !(0..=MAX_RATING).contains(&rating) => {
                Err(AppError::InvalidInput(format!(
                    "rating must be between 0 and {}, got {}",
                    MAX_RATING, rating
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_its_own_name() {
        for kind in [
            InteractionKind::View,
            InteractionKind::Like,
            InteractionKind::Dislike,
            InteractionKind::Rate,
        ] {
            assert_eq!(kind.as_str().parse::<InteractionKind>(), Ok(kind));
        }
        assert!("share".parse::<InteractionKind>().is_err());
    }

    #[test]
    fn test_rating_bounds() {
        assert!(UserInteraction::rated(1, 550, 0).validate().is_ok());
        assert!(UserInteraction::rated(1, 550, 10).validate().is_ok());
        assert!(matches!(
            UserInteraction::rated(1, 550, 11).validate(),
            Err(AppError::InvalidInput(_))
        ));
        assert!(UserInteraction::rated(1, 550, -1).validate().is_err());
        assert!(UserInteraction::new(1, 550, InteractionKind::Like)
            .validate()
            .is_ok());
    }
}
