use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Catalog identifier (the upstream metadata provider's numeric id)
pub type ItemId = i64;

/// Kind of catalog entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Movie => "movie",
            ContentKind::Series => "series",
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ContentKind::Movie),
            "series" => Ok(ContentKind::Series),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

/// A movie or series as supplied by the catalog
///
/// Name lists keep the order the catalog returns them in. Series carry no
/// directors, so `directors` is `None` for them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: ItemId,
    pub title: String,
    pub kind: ContentKind,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub directors: Option<Vec<String>>,
}

impl CatalogItem {
    /// Creates a movie entry
    pub fn movie(
        id: ItemId,
        title: impl Into<String>,
        genres: &[&str],
        actors: &[&str],
        directors: &[&str],
    ) -> Self {
        Self {
            id,
            title: title.into(),
            kind: ContentKind::Movie,
            genres: to_owned(genres),
            actors: to_owned(actors),
            directors: Some(to_owned(directors)),
        }
    }

    /// Creates a series entry
    pub fn series(id: ItemId, title: impl Into<String>, genres: &[&str], actors: &[&str]) -> Self {
        Self {
            id,
            title: title.into(),
            kind: ContentKind::Series,
            genres: to_owned(genres),
            actors: to_owned(actors),
            directors: None,
        }
    }

    /// Director names, empty for series
    pub fn director_names(&self) -> &[String] {
        self.directors.as_deref().unwrap_or(&[])
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
