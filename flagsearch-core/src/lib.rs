//! FlagSearch Core
//!
//! Similarity search over flag images featurised by pretrained CNNs.
//! Each model's bottleneck features are loaded from CSV into memory once,
//! indexed for k-nearest-neighbour queries and expanded into a full
//! pairwise cosine similarity matrix.
//!
//! ## Features
//!
//! - **Feature store** - One table per model, keyed by `(filename, territory_name)`
//! - **KNN index** - Exact scan or HNSW candidate search, cosine distance
//! - **Similarity matrix** - Pre-computed all-pairs cosine similarity
//! - **Search engine** - Per-model top-k with deterministic tie-breaks
//!
//! ## Example
//!
//! ```ignore
//! use flagsearch_core::{EngineConfig, SearchEngine, SearchMethod};
//!
//! let engine = SearchEngine::build(&EngineConfig::new("data/*.csv").with_k(10))?;
//!
//! for (model, hits) in engine.search("France", SearchMethod::Cosine)? {
//!     println!("{}: {:?}", model, hits);
//! }
//! ```

pub mod error;
pub mod feature;
pub mod knn;
pub mod matrix;
pub mod search;
pub mod similarity;

// Re-exports for convenience
pub use error::{Result, SearchError};
pub use feature::{FeatureSet, FeatureStore, Identity};
pub use knn::{HnswParams, KnnAlgorithm, KnnIndex};
pub use matrix::SimilarityMatrix;
pub use search::{
    EngineConfig, ModelSummary, SearchEngine, SearchHit, SearchMethod, SearchResult,
};
pub use similarity::{cosine_distance, cosine_similarity, Neighbor};
