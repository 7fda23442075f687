//! Content-based recommendations for a movie and series catalog.
//!
//! Catalog items are encoded as bags of genre, cast and crew names, fitted
//! into a TF-IDF space that is cached until the catalog changes, and scored
//! against user selections by cosine similarity.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use error::{AppError, AppResult};
pub use state::AppState;
