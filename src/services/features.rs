use crate::models::CatalogItem;

/// Encodes an item's categorical attributes as one bag-of-terms string
///
/// Genres, then actors, then directors, each segment space-joined. Names are
/// passed through untouched so identical names across items line up as
/// identical terms.
pub fn feature_blob(item: &CatalogItem) -> String {
    let genres = item.genres.join(" ");
    let actors = item.actors.join(" ");
    let directors = item.director_names().join(" ");
    format!("{} {} {}", genres, actors, directors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_blob_order() {
        let movie = CatalogItem::movie(
            1,
            "Heat",
            &["Action", "Crime"],
            &["Al Pacino", "Robert De Niro"],
            &["Michael Mann"],
        );
        assert_eq!(
            feature_blob(&movie),
            "Action Crime Al Pacino Robert De Niro Michael Mann"
        );
    }

    #[test]
    fn test_series_blob_has_empty_director_segment() {
        let series = CatalogItem::series(2, "Fargo", &["Crime"], &["Billy Bob Thornton"]);
        assert_eq!(feature_blob(&series), "Crime Billy Bob Thornton ");
    }

    #[test]
    fn test_blob_keeps_case_and_punctuation() {
        let movie = CatalogItem::movie(3, "Amélie", &["Rom-Com"], &["Audrey Tautou"], &[]);
        assert!(feature_blob(&movie).starts_with("Rom-Com Audrey Tautou"));
    }

    #[test]
    fn test_empty_item_blob_is_whitespace() {
        let series = CatalogItem::series(4, "Untitled", &[], &[]);
        assert!(feature_blob(&series).trim().is_empty());
    }
}
