//! Similarity search engine
//!
//! Owns every model's feature set, KNN index and similarity matrix, and
//! answers per-model top-k queries for a territory under either method.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, SearchError};
use crate::feature::{FeatureSet, FeatureStore, Identity};
use crate::knn::{HnswParams, KnnAlgorithm, KnnIndex};
use crate::matrix::SimilarityMatrix;
use crate::similarity::Neighbor;

/// How neighbours are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// Query the KNN index with the territory's vector
    Knn,
    /// Read the pre-computed similarity matrix
    #[default]
    Cosine,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knn => "knn",
            Self::Cosine => "cosine",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMethod {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knn" => Ok(Self::Knn),
            "cosine" => Ok(Self::Cosine),
            _ => Err(SearchError::invalid_method(s)),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Glob pattern matching one feature CSV per model
    pub pattern: String,
    /// Results returned per model (default: 10)
    pub k: usize,
    /// KNN strategy (default: exact)
    pub algorithm: KnnAlgorithm,
    /// Only used by the HNSW strategy
    pub hnsw: HnswParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pattern: "data/*.csv".to_string(),
            k: 10,
            algorithm: KnnAlgorithm::Exact,
            hnsw: HnswParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_algorithm(mut self, algorithm: KnnAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_hnsw(mut self, hnsw: HnswParams) -> Self {
        self.hnsw = hnsw;
        self
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub filename: String,
    pub territory_name: String,
    /// Cosine distance to the query, 0 = identical
    pub score: f32,
}

/// Ranked hits of one model, ascending by score
pub type SearchResult = Vec<SearchHit>;

/// Size and shape of a loaded model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub rows: usize,
    pub dimension: usize,
}

/// Per-model search structures
struct ModelIndex {
    features: Arc<FeatureSet>,
    knn: KnnIndex,
    matrix: SimilarityMatrix,
}

impl ModelIndex {
    fn hits(&self, neighbors: Vec<Neighbor>) -> SearchResult {
        neighbors
            .into_iter()
            .filter_map(|n| {
                self.features.identity(n.row).map(|id| SearchHit {
                    filename: id.filename.clone(),
                    territory_name: id.territory_name.clone(),
                    score: n.distance,
                })
            })
            .collect()
    }
}

/// Similarity search over every loaded model
///
/// Built once, read-only afterwards. A lookup miss in any model fails the
/// whole query; no partial result is returned.
pub struct SearchEngine {
    k: usize,
    models: BTreeMap<String, ModelIndex>,
}

impl SearchEngine {
    /// Load every feature file and build all indices and matrices
    pub fn build(config: &EngineConfig) -> Result<Self> {
        log::info!("Loading features from {}", config.pattern);
        let store = FeatureStore::load(&config.pattern)?;
        Self::from_store(store, config)
    }

    /// Build indices and matrices over an already loaded store
    pub fn from_store(store: FeatureStore, config: &EngineConfig) -> Result<Self> {
        if config.k == 0 {
            return Err(SearchError::load("k must be positive"));
        }
        if store.is_empty() {
            return Err(SearchError::load("No feature sets loaded"));
        }

        let sets: Vec<Arc<FeatureSet>> = store.into_sets().map(Arc::new).collect();

        let mut indices = Vec::with_capacity(sets.len());
        for set in &sets {
            log::info!("Setting up KNN search using {} features", set.name());
            indices.push(KnnIndex::build_with(
                Arc::clone(set),
                config.k,
                config.algorithm,
                config.hnsw,
            )?);
        }

        let mut models = BTreeMap::new();
        for (set, knn) in sets.into_iter().zip(indices) {
            log::info!("Pre-computing cosine similarity using {} features", set.name());
            let matrix = SimilarityMatrix::build(Arc::clone(&set));
            models.insert(
                set.name().to_string(),
                ModelIndex {
                    features: set,
                    knn,
                    matrix,
                },
            );
        }

        log::info!("Search engine ready ({} models, k={})", models.len(), config.k);

        Ok(Self {
            k: config.k,
            models,
        })
    }

    /// Results returned per model
    pub fn k(&self) -> usize {
        self.k
    }

    /// Top-k matches for a territory in every model, keyed by model name
    pub fn search(
        &self,
        territory: &str,
        method: SearchMethod,
    ) -> Result<BTreeMap<String, SearchResult>> {
        log::debug!("search territory={} method={}", territory, method);

        // Resolve everywhere first so a miss never yields partial results
        let mut resolved = Vec::with_capacity(self.models.len());
        for (name, model) in &self.models {
            let row = model
                .features
                .position_of_territory(territory)
                .ok_or_else(|| SearchError::unknown_territory(territory, name.as_str()))?;
            resolved.push((name, model, row));
        }

        let mut results = BTreeMap::new();
        for (name, model, row) in resolved {
            let neighbors = match method {
                SearchMethod::Knn => model.knn.query_row(row, self.k)?,
                SearchMethod::Cosine => model.matrix.top_k_for_row(row, self.k)?,
            };
            results.insert(name.clone(), model.hits(neighbors));
        }

        Ok(results)
    }

    /// Same as [`search`](Self::search) with the method given as a string
    pub fn search_named(
        &self,
        territory: &str,
        method: &str,
    ) -> Result<BTreeMap<String, SearchResult>> {
        let method = method.parse::<SearchMethod>()?;
        self.search(territory, method)
    }

    /// Loaded models in name order
    pub fn models(&self) -> Vec<ModelSummary> {
        self.models
            .values()
            .map(|m| ModelSummary {
                name: m.features.name().to_string(),
                rows: m.features.len(),
                dimension: m.features.dimension(),
            })
            .collect()
    }

    pub fn feature_set(&self, model: &str) -> Option<&FeatureSet> {
        self.models.get(model).map(|m| m.features.as_ref())
    }

    pub fn knn_index(&self, model: &str) -> Option<&KnnIndex> {
        self.models.get(model).map(|m| &m.knn)
    }

    pub fn similarity_matrix(&self, model: &str) -> Option<&SimilarityMatrix> {
        self.models.get(model).map(|m| &m.matrix)
    }

    /// Identities of the first model, sorted by territory name
    pub fn territories(&self) -> Vec<Identity> {
        let mut territories = self
            .models
            .values()
            .next()
            .map(|m| m.features.identities().to_vec())
            .unwrap_or_default();
        territories.sort_by(|a, b| {
            a.territory_name
                .cmp(&b.territory_name)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        territories
    }

    /// Filename shown for a territory
    pub fn filename_for(&self, territory: &str) -> Option<&str> {
        let features = &self.models.values().next()?.features;
        let row = features.position_of_territory(territory)?;
        features.identity(row).map(|id| id.filename.as_str())
    }

    /// Territory name of a filename
    pub fn territory_for(&self, filename: &str) -> Option<&str> {
        let features = &self.models.values().next()?.features;
        let row = features.position_of_filename(filename)?;
        features.identity(row).map(|id| id.territory_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(name: &str, rows: &[(&str, &str, [f32; 3])]) -> FeatureSet {
        let columns = vec!["F_000000".into(), "F_000001".into(), "F_000002".into()];
        let rows = rows
            .iter()
            .map(|(f, t, v)| (Identity::new(*f, *t), v.to_vec()))
            .collect();
        FeatureSet::from_rows(name, columns, rows).unwrap()
    }

    fn engine(k: usize) -> SearchEngine {
        let flags = [
            ("fr.jpg", "France", [1.0, 0.0, 0.0]),
            ("de.jpg", "Germany", [0.0, 1.0, 0.0]),
            ("be.jpg", "Belgium", [0.9, 0.1, 0.0]),
        ];
        let store = FeatureStore::from_sets([set("VGG16", &flags), set("Xception", &flags)]).unwrap();
        SearchEngine::from_store(store, &EngineConfig::default().with_k(k)).unwrap()
    }

    #[test]
    fn test_search_method_parse() {
        assert_eq!("knn".parse::<SearchMethod>().unwrap(), SearchMethod::Knn);
        assert_eq!("Cosine".parse::<SearchMethod>().unwrap(), SearchMethod::Cosine);
        assert!(matches!(
            "euclidean".parse::<SearchMethod>(),
            Err(SearchError::InvalidMethod(_))
        ));
        assert_eq!(SearchMethod::default(), SearchMethod::Cosine);
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.k, 10);
        assert_eq!(config.algorithm, KnnAlgorithm::Exact);
        assert_eq!(config.pattern, "data/*.csv");
    }

    #[test]
    fn test_cosine_search_france() {
        let engine = engine(2);
        let results = engine.search("France", SearchMethod::Cosine).unwrap();
        assert_eq!(results.len(), 2);

        for hits in results.values() {
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].territory_name, "France");
            assert_eq!(hits[0].score, 0.0);
            assert_eq!(hits[1].territory_name, "Belgium");
        }
    }

    #[test]
    fn test_knn_and_cosine_agree() {
        let engine = engine(3);
        let knn = engine.search("Germany", SearchMethod::Knn).unwrap();
        let cosine = engine.search("Germany", SearchMethod::Cosine).unwrap();

        for (model, hits) in &knn {
            let names: Vec<_> = hits.iter().map(|h| h.territory_name.as_str()).collect();
            let other: Vec<_> = cosine[model]
                .iter()
                .map(|h| h.territory_name.as_str())
                .collect();
            assert_eq!(names, other);
            assert!(hits[0].score.abs() < 1e-6);
        }
    }

    #[test]
    fn test_unknown_territory_fails_all_models() {
        let engine = engine(2);
        let err = engine.search("Atlantis", SearchMethod::Knn).unwrap_err();
        assert!(matches!(err, SearchError::UnknownTerritory { .. }));
    }

    #[test]
    fn test_strict_policy_on_partial_coverage() {
        let full = [
            ("fr.jpg", "France", [1.0, 0.0, 0.0]),
            ("de.jpg", "Germany", [0.0, 1.0, 0.0]),
        ];
        let partial = [("fr.jpg", "France", [1.0, 0.0, 0.0])];
        let store = FeatureStore::from_sets([set("A", &full), set("B", &partial)]).unwrap();
        let engine = SearchEngine::from_store(store, &EngineConfig::default()).unwrap();

        match engine.search("Germany", SearchMethod::Cosine) {
            Err(SearchError::UnknownTerritory { model, .. }) => assert_eq!(model, "B"),
            other => panic!("Expected UnknownTerritory, got {:?}", other),
        }
        assert_eq!(engine.search("France", SearchMethod::Cosine).unwrap().len(), 2);
    }

    #[test]
    fn test_search_named_rejects_bad_method() {
        let engine = engine(2);
        assert!(matches!(
            engine.search_named("France", "euclidean"),
            Err(SearchError::InvalidMethod(_))
        ));
        assert!(engine.search_named("France", "knn").is_ok());
    }

    #[test]
    fn test_zero_k_rejected() {
        let store = FeatureStore::from_sets([set("A", &[("a", "A", [1.0, 0.0, 0.0])])]).unwrap();
        assert!(SearchEngine::from_store(store, &EngineConfig::default().with_k(0)).is_err());
    }

    #[test]
    fn test_territory_catalogue() {
        let engine = engine(2);
        let names: Vec<_> = engine
            .territories()
            .into_iter()
            .map(|id| id.territory_name)
            .collect();
        assert_eq!(names, vec!["Belgium", "France", "Germany"]);
        assert_eq!(engine.filename_for("Germany"), Some("de.jpg"));
        assert_eq!(engine.territory_for("be.jpg"), Some("Belgium"));
        assert_eq!(engine.filename_for("Atlantis"), None);
    }

    #[test]
    fn test_models_summary() {
        let engine = engine(2);
        let models = engine.models();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "VGG16");
        assert_eq!(models[0].rows, 3);
        assert_eq!(models[0].dimension, 3);
        assert!(engine.knn_index("VGG16").is_some());
        assert!(engine.similarity_matrix("Xception").is_some());
        assert!(engine.feature_set("ResNet").is_none());
    }

    #[test]
    fn test_zero_norm_territory_ranks_itself_first() {
        let flags = [
            ("fr.jpg", "France", [1.0, 0.0, 0.0]),
            ("blank.jpg", "Blank", [0.0, 0.0, 0.0]),
        ];
        let store = FeatureStore::from_sets([set("VGG16", &flags)]).unwrap();
        let engine = SearchEngine::from_store(store, &EngineConfig::default().with_k(2)).unwrap();

        for method in [SearchMethod::Knn, SearchMethod::Cosine] {
            let hits = &engine.search("Blank", method).unwrap()["VGG16"];
            let names: Vec<_> = hits.iter().map(|h| h.territory_name.as_str()).collect();
            assert_eq!(names, vec!["Blank", "France"], "{}", method);
            assert_eq!(hits[0].score, 0.0);
        }
    }
}
