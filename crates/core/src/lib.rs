//! # hnswscan-core
//!
//! Query-time engine of a disk-backed HNSW index: the layered beam search
//! over an existing proximity graph and the ordered scan that turns it into a
//! pull-based stream of heap row identifiers under a page-pin contract.
//!
//! The graph, the distance support functions and the buffer pool come in
//! through the [`GraphStore`](hnsw::graph::GraphStore),
//! [`DistanceOracle`](hnsw::distance::DistanceOracle) and
//! [`BufferPool`](buffer::BufferPool) traits. An in-memory graph and a
//! serial reference builder are included for tests and tooling.

/// Page pins: the buffer pool seam, the RAII pin guard, and a tracking pool.
pub mod buffer;
/// Global configuration constants: limits, defaults, and page layout.
pub mod config;
/// Error types for scans, options, and the reference builder.
pub mod error;
/// HNSW graph, distance functions, layer search, and the reference builder.
pub mod hnsw;
/// Per-scan options.
pub mod options;
/// Page addressing: block numbers, heap tids, and element placement.
pub mod page;
/// Brute-force ground truth and recall.
pub mod recall;
/// Operator classes and the index relation.
pub mod relation;
/// The ordered index scan.
pub mod scan;
/// Scan statistics.
pub mod stats;

pub use error::{BuildError, OptionsError, ScanError};
pub use options::ScanOptions;
pub use relation::{IndexRelation, OperatorClass};
pub use scan::{HnswScan, ScanDirection, ScanKey};
