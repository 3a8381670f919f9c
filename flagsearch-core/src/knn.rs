//! K-nearest-neighbour index over one feature set
//!
//! `Exact` scans every row. `Hnsw` uses instant-distance HNSW to pick
//! candidates and re-ranks them with the same comparator, so only the
//! candidate set can differ from an exact scan.

use std::sync::Arc;

use instant_distance::{Builder, HnswMap, Point, Search};

use crate::error::{Result, SearchError};
use crate::feature::FeatureSet;
use crate::similarity::{cosine_distance, cosine_similarity_with_norms, norm, top_k, Neighbor};

/// Neighbour search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KnnAlgorithm {
    /// Brute-force scan, exact top-k
    #[default]
    Exact,
    /// Approximate HNSW graph search
    Hnsw,
}

/// HNSW construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswParams {
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            ef_construction: 100,
            ef_search: 100,
            seed: 0x5eed_f1a6,
        }
    }
}

/// HNSW point wrapper for feature vectors
#[derive(Clone)]
struct FeaturePoint {
    vector: Vec<f32>,
}

impl Point for FeaturePoint {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance = 1 - similarity (HNSW finds minimum)
        cosine_distance(&self.vector, &other.vector)
    }
}

enum Backend {
    Exact,
    Hnsw {
        map: HnswMap<FeaturePoint, usize>,
        ef_search: usize,
    },
}

/// Nearest-neighbour index using cosine distance
pub struct KnnIndex {
    features: Arc<FeatureSet>,
    norms: Vec<f64>,
    k: usize,
    backend: Backend,
}

impl KnnIndex {
    /// Build an exact index with a default neighbour count
    pub fn build(features: Arc<FeatureSet>, k: usize) -> Result<Self> {
        Self::build_with(features, k, KnnAlgorithm::Exact, HnswParams::default())
    }

    /// Build an index with an explicit algorithm
    pub fn build_with(
        features: Arc<FeatureSet>,
        k: usize,
        algorithm: KnnAlgorithm,
        params: HnswParams,
    ) -> Result<Self> {
        if k == 0 {
            return Err(SearchError::load("k must be positive"));
        }

        let norms = features.rows().map(|(_, v)| norm(v)).collect();

        let backend = match algorithm {
            KnnAlgorithm::Exact => Backend::Exact,
            KnnAlgorithm::Hnsw => {
                let points: Vec<FeaturePoint> = features
                    .rows()
                    .map(|(_, v)| FeaturePoint { vector: v.to_vec() })
                    .collect();
                let rows: Vec<usize> = (0..points.len()).collect();
                let ef_search = params.ef_search.max(k);
                let map = Builder::default()
                    .ef_construction(params.ef_construction)
                    .ef_search(ef_search)
                    .seed(params.seed)
                    .build(points, rows);
                Backend::Hnsw { map, ef_search }
            }
        };

        log::info!(
            "Built {:?} KNN index for {} ({} rows, k={})",
            algorithm,
            features.name(),
            features.len(),
            k
        );

        Ok(Self {
            features,
            norms,
            k,
            backend,
        })
    }

    /// Default neighbour count
    pub fn k(&self) -> usize {
        self.k
    }

    /// Dimensionality of indexed vectors
    pub fn dimension(&self) -> usize {
        self.features.dimension()
    }

    pub fn algorithm(&self) -> KnnAlgorithm {
        match self.backend {
            Backend::Exact => KnnAlgorithm::Exact,
            Backend::Hnsw { .. } => KnnAlgorithm::Hnsw,
        }
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// The `k` closest rows to `vector`, ascending by distance
    ///
    /// An indexed row equal to the query is returned at distance 0.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if vector.len() != self.dimension() {
            return Err(SearchError::Dimension {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        Ok(self.search(vector, k, None))
    }

    /// Query with the index's default `k`
    pub fn query_default(&self, vector: &[f32]) -> Result<Vec<Neighbor>> {
        self.query(vector, self.k)
    }

    /// Query by an indexed row's own vector
    ///
    /// The row itself is always at distance 0, even when its vector has
    /// zero norm, matching the similarity matrix's unit diagonal.
    pub fn query_row(&self, row: usize, k: usize) -> Result<Vec<Neighbor>> {
        let vector = self.features.vector(row).ok_or_else(|| {
            SearchError::unknown_identity(format!("row {} of {}", row, self.features.name()))
        })?;
        if k == 0 {
            return Ok(Vec::new());
        }
        Ok(self.search(vector, k, Some(row)))
    }

    fn search(&self, vector: &[f32], k: usize, self_row: Option<usize>) -> Vec<Neighbor> {
        match &self.backend {
            Backend::Hnsw { map, ef_search } if k <= *ef_search => {
                self.hnsw_search(map, vector, k, self_row)
            }
            Backend::Hnsw { ef_search, .. } => {
                log::debug!("k={} exceeds ef_search={}, scanning", k, ef_search);
                self.exact_search(vector, k, self_row)
            }
            Backend::Exact => self.exact_search(vector, k, self_row),
        }
    }

    fn distance(&self, vector: &[f32], query_norm: f64, row: usize, self_row: Option<usize>) -> f32 {
        if self_row == Some(row) {
            return 0.0;
        }
        match self.features.vector(row) {
            Some(v) => 1.0 - cosine_similarity_with_norms(vector, v, query_norm, self.norms[row]),
            None => 1.0,
        }
    }

    fn exact_search(&self, vector: &[f32], k: usize, self_row: Option<usize>) -> Vec<Neighbor> {
        let query_norm = norm(vector);
        let neighbors = (0..self.features.len())
            .map(|row| Neighbor {
                row,
                distance: self.distance(vector, query_norm, row, self_row),
            })
            .collect();
        top_k(neighbors, k)
    }

    fn hnsw_search(
        &self,
        map: &HnswMap<FeaturePoint, usize>,
        vector: &[f32],
        k: usize,
        self_row: Option<usize>,
    ) -> Vec<Neighbor> {
        let query_norm = norm(vector);
        let query = FeaturePoint {
            vector: vector.to_vec(),
        };
        let mut search = Search::default();

        let mut candidates: Vec<Neighbor> = map
            .search(&query, &mut search)
            .map(|item| {
                let row = *item.value;
                Neighbor {
                    row,
                    distance: self.distance(vector, query_norm, row, self_row),
                }
            })
            .collect();

        // The graph may not surface a zero-norm row near itself
        if let Some(row) = self_row {
            if !candidates.iter().any(|n| n.row == row) {
                candidates.push(Neighbor { row, distance: 0.0 });
            }
        }
        top_k(candidates, k)
    }
}
