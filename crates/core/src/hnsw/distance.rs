//! Distance functions bound to the index's operator class.
//!
//! Supports four metrics: squared Euclidean (L2²), negative inner product,
//! cosine distance and taxicab (L1). Components are `f32`; accumulation and
//! results are `f64`. All metrics return a distance where **lower is closer**.

use crate::error::NormalizationError;
use serde::{Deserialize, Serialize};

/// Collation the host attached to the indexed column.
///
/// Passed through to every distance call. The built-in metrics ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Collation(pub u32);

impl Collation {
    /// No collation (vector columns are not collatable).
    pub const NONE: Collation = Collation(0);
}

/// Distance capability a scan binds once at open time.
///
/// `normalize` is only consulted when `normalizes` returns `true`.
pub trait DistanceOracle: Send + Sync {
    /// Distance between two vectors of equal dimension.
    fn distance(&self, collation: Collation, a: &[f32], b: &[f32]) -> f64;

    /// Whether query vectors must be normalized before searching.
    fn normalizes(&self) -> bool {
        false
    }

    /// Returns the normalized form of `value`, or an error when the
    /// normalization is undefined for it.
    fn normalize(
        &self,
        _collation: Collation,
        value: &[f32],
    ) -> Result<Vec<f32>, NormalizationError> {
        Ok(value.to_vec())
    }
}

/// Built-in distance metrics, one per supported operator class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance. Orders exactly like Euclidean distance.
    L2,
    /// Negative inner product: `-dot(a, b)`.
    InnerProduct,
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\], NaN for zero vectors.
    Cosine,
    /// Taxicab distance: sum of absolute differences.
    L1,
}

impl DistanceMetric {
    /// Distance between `a` and `b` under this metric.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceMetric::L2 => l2_squared(a, b),
            DistanceMetric::InnerProduct => -dot_product(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::L1 => l1_distance(a, b),
        }
    }

    /// True distance, as a brute-force `ORDER BY` would compute it.
    /// Differs from [`distance`](Self::distance) only for L2, which is not squared here.
    pub fn exact_distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceMetric::L2 => l2_squared(a, b).sqrt(),
            other => other.distance(a, b),
        }
    }
}

impl DistanceOracle for DistanceMetric {
    fn distance(&self, _collation: Collation, a: &[f32], b: &[f32]) -> f64 {
        DistanceMetric::distance(self, a, b)
    }

    fn normalizes(&self) -> bool {
        matches!(self, DistanceMetric::Cosine)
    }

    fn normalize(
        &self,
        _collation: Collation,
        value: &[f32],
    ) -> Result<Vec<f32>, NormalizationError> {
        normalize(value)
    }
}

/// Sum of squared differences.
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum()
}

#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}

#[inline]
pub fn l1_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x as f64 - y as f64).abs())
        .sum()
}

/// Cosine distance. Returns NaN when either vector has zero norm.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    // Rounding can push the similarity just outside [-1, 1]
    1.0 - (dot / denom).clamp(-1.0, 1.0)
}

/// Euclidean norm.
#[inline]
pub fn norm(value: &[f32]) -> f64 {
    value
        .iter()
        .map(|&x| (x as f64) * (x as f64))
        .sum::<f64>()
        .sqrt()
}

/// Scales `value` to unit length. Fails for zero or non-finite norms.
pub fn normalize(value: &[f32]) -> Result<Vec<f32>, NormalizationError> {
    let norm = norm(value);
    if norm == 0.0 || !norm.is_finite() {
        return Err(NormalizationError { norm });
    }
    Ok(value.iter().map(|&x| (x as f64 / norm) as f32).collect())
}
