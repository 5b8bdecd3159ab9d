//! Content-based movie recommendations over a static catalog.
//!
//! An offline build turns TMDB movie and credit tables into text profiles, fits a
//! TF-IDF space over them and stores the catalog together with a dense cosine
//! similarity matrix. Serving loads both artifacts once and answers "more like this"
//! queries by ranking one matrix row.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ingest;
pub mod normalizer;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod recommender;
pub mod similarity;
pub mod stopwords;
pub mod store;
pub mod vectorizer;

pub use catalog::{Catalog, Movie};
pub use error::{ArtifactError, BuildError, RecommendError};
pub use recommender::{recommend, Recommendation, Recommender};
pub use similarity::SimilarityMatrix;
pub use store::load_artifacts;
