pub mod catalog;
pub mod features;
pub mod fingerprint;
pub mod model_cache;
pub mod preferences;
pub mod recommendations;
pub mod recommender;
pub mod sampler;
pub mod training;
pub mod vector_space;
pub mod vectorizer;

pub use catalog::CatalogService;
pub use features::feature_blob;
pub use fingerprint::PreferenceVectorizer;
pub use model_cache::ModelCache;
pub use preferences::PreferenceService;
pub use recommendations::{RecommendationService, TitleResolution};
pub use recommender::Recommender;
pub use training::{train_and_save_model, TrainingReport};
pub use vector_space::VectorSpace;
pub use vectorizer::{TfIdfVectorizer, TokenizerOptions};
