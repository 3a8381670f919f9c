//! Cosine similarity primitives and neighbour ranking
//!
//! Both query methods report cosine distance (`1 - similarity`) and rank
//! with the same comparator so their results line up.

use std::cmp::Ordering;

/// A ranked row of a feature set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row position in the feature set
    pub row: usize,
    /// Cosine distance to the query (0 = same direction)
    pub distance: f32,
}

impl Neighbor {
    /// Ascending distance, ties by row order
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.row.cmp(&other.row))
    }
}

/// Sort neighbours by `(distance, row)` and keep the first `k`
pub fn top_k(mut neighbors: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    neighbors.sort_by(Neighbor::rank_cmp);
    neighbors.truncate(k);
    neighbors
}

/// Euclidean norm, accumulated in f64
pub fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt()
}

/// Cosine similarity with precomputed norms, clamped to [-1, 1]
///
/// Accumulates in f64 so a vector's similarity with itself rounds to
/// exactly 1.0. A zero-norm vector has similarity 0 with everything.
pub fn cosine_similarity_with_norms(a: &[f32], b: &[f32], norm_a: f64, norm_b: f64) -> f32 {
    if a.len() != b.len() || norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity_with_norms(a, b, norm(a), norm(b))
}

/// Cosine distance, `1 - cosine_similarity`
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
