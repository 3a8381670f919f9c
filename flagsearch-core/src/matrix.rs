//! Pre-computed all-pairs cosine similarity matrix
//!
//! Built once per feature set in O(N²·D). Lookups convert a column to
//! cosine distance and rank it with the shared `(distance, row)` order.

use std::sync::Arc;

use crate::error::{Result, SearchError};
use crate::feature::FeatureSet;
use crate::similarity::{cosine_similarity_with_norms, norm, top_k, Neighbor};

/// Dense N×N similarity matrix in feature set row order
pub struct SimilarityMatrix {
    features: Arc<FeatureSet>,
    size: usize,
    /// Row-major
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// Compute every pairwise similarity of a feature set
    pub fn build(features: Arc<FeatureSet>) -> Self {
        let size = features.len();
        let norms: Vec<f64> = features.rows().map(|(_, v)| norm(v)).collect();
        let vectors: Vec<&[f32]> = features.rows().map(|(_, v)| v).collect();
        let mut values = vec![0.0_f32; size * size];

        // Upper triangle mirrored, so symmetry is exact
        for i in 0..size {
            values[i * size + i] = 1.0;
            for j in (i + 1)..size {
                let s = cosine_similarity_with_norms(vectors[i], vectors[j], norms[i], norms[j]);
                values[i * size + j] = s;
                values[j * size + i] = s;
            }
        }

        log::info!(
            "Pre-computed cosine similarity for {} ({}x{})",
            features.name(),
            size,
            size
        );

        Self {
            features,
            size,
            values,
        }
    }

    /// Number of rows (and columns)
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Similarity between rows `i` and `j`
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i < self.size && j < self.size {
            Some(self.values[i * self.size + j])
        } else {
            None
        }
    }

    /// Column of similarities for one row
    pub fn column(&self, row: usize) -> Option<&[f32]> {
        if row < self.size {
            // Symmetric: the row slice equals the column
            Some(&self.values[row * self.size..(row + 1) * self.size])
        } else {
            None
        }
    }

    /// The `k` entries closest to a territory, including itself
    pub fn top_k(&self, territory: &str, k: usize) -> Result<Vec<Neighbor>> {
        let row = self
            .features
            .position_of_territory(territory)
            .ok_or_else(|| SearchError::unknown_identity(territory))?;
        self.top_k_for_row(row, k)
    }

    /// The `k` entries closest to a filename, including itself
    pub fn top_k_by_filename(&self, filename: &str, k: usize) -> Result<Vec<Neighbor>> {
        let row = self
            .features
            .position_of_filename(filename)
            .ok_or_else(|| SearchError::unknown_identity(filename))?;
        self.top_k_for_row(row, k)
    }

    /// The `k` entries closest to a row, including itself
    pub fn top_k_for_row(&self, row: usize, k: usize) -> Result<Vec<Neighbor>> {
        let column = self.column(row).ok_or_else(|| {
            SearchError::unknown_identity(format!("row {} of {}", row, self.features.name()))
        })?;

        let neighbors = column
            .iter()
            .enumerate()
            .map(|(row, similarity)| Neighbor {
                row,
                distance: 1.0 - similarity,
            })
            .collect();
        Ok(top_k(neighbors, k))
    }
}
