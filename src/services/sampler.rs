use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::CatalogItem;

/// Picks `top_n` items uniformly at random, without replacement
///
/// A catalog smaller than `top_n` is returned whole, in catalog order.
pub fn sample_with<R: Rng + ?Sized>(
    items: &[CatalogItem],
    top_n: usize,
    rng: &mut R,
) -> Vec<CatalogItem> {
    if items.len() < top_n {
        return items.to_vec();
    }
    items.choose_multiple(rng, top_n).cloned().collect()
}

/// [`sample_with`] using the thread-local generator
pub fn sample(items: &[CatalogItem], top_n: usize) -> Vec<CatalogItem> {
    sample_with(items, top_n, &mut rand::thread_rng())
}
