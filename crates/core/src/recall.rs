//! Brute-force ground truth and recall measurement.

use crate::hnsw::distance::DistanceMetric;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::hash::Hash;

/// `count` vectors of `dimension` components drawn uniformly from [0, 1).
pub fn random_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dimension).map(|_| rng.gen::<f32>()).collect())
        .collect()
}

/// Indexes of the `k` vectors nearest to `query`, nearest first.
/// Ties go to the lower index. Vectors at a NaN distance are excluded.
pub fn exact_top_k(vectors: &[Vec<f32>], query: &[f32], k: usize, metric: DistanceMetric) -> Vec<usize> {
    let mut scored: Vec<(OrderedFloat<f64>, usize)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (OrderedFloat(metric.distance(query, v)), i))
        .filter(|(d, _)| !d.0.is_nan())
        .collect();

    let k = k.min(scored.len());
    if k == 0 {
        return Vec::new();
    }
    scored.select_nth_unstable(k - 1);
    scored.truncate(k);
    scored.sort_unstable();
    scored.into_iter().map(|(_, i)| i).collect()
}

/// Fraction of `truth` present in `found`. An empty `truth` counts as full recall.
pub fn recall<T: Eq + Hash>(found: &[T], truth: &[T]) -> f64 {
    if truth.is_empty() {
        return 1.0;
    }
    let found: HashSet<&T> = found.iter().collect();
    let hits = truth.iter().filter(|t| found.contains(t)).count();
    hits as f64 / truth.len() as f64
}
