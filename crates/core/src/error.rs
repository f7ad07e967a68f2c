//! Error types for scanning and building an HNSW index.
//!
//! Only usage mistakes surface as errors during a scan. Null queries,
//! degenerate vectors and empty graphs are ordinary empty results and never
//! reach these types.

use crate::scan::ScanDirection;
use thiserror::Error;

/// Usage errors raised by [`HnswScan`](crate::scan::HnswScan). Fatal to the scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The scan was opened without an ordering expression.
    #[error("cannot scan hnsw index without order")]
    MissingOrderBy,
    /// More than one ordering expression was supplied.
    #[error("hnsw index scans support exactly one order by expression, got {0}")]
    UnsupportedOrderByCount(usize),
    /// Only forward scans are supported.
    #[error("hnsw index does not support {0:?} scans")]
    UnsupportedDirection(ScanDirection),
    /// The query vector does not match the dimension of the indexed vectors.
    #[error("different vector dimensions {expected} and {actual}")]
    DimensionMismatch {
        /// Dimension of the indexed vectors.
        expected: usize,
        /// Dimension of the query vector.
        actual: usize,
    },
}

/// Invalid per-scan options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("ef_search must be between {min} and {max}, got {value}")]
    EfSearchOutOfRange { value: usize, min: usize, max: usize },
}

/// A vector that cannot be normalized (zero or non-finite norm).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("cannot normalize a vector with norm {norm}")]
pub struct NormalizationError {
    /// The offending norm.
    pub norm: f64,
}

/// Errors raised by the reference graph builder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("expected {expected} dimensions, not {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("dimension must be between 1 and {max}, got {actual}")]
    InvalidDimension { actual: usize, max: usize },
    #[error("NaN or infinite value at position {index} not allowed in vector")]
    NonFiniteValue { index: usize },
    #[error("invalid build parameter: {0}")]
    InvalidParameter(String),
}

/// Convenience alias for scan results.
pub type Result<T, E = ScanError> = std::result::Result<T, E>;
