//! Hierarchical Navigable Small World (HNSW) graph search.
//!
//! The graph is an arena: nodes are dense `u32` ids, and each node stores a
//! neighbor list per layer it lives on. Searches only read the graph.
//! `build` is a serial reference builder that produces graphs for tests and
//! tooling; scans never depend on it.

/// Serial reference builder with heuristic neighbor selection.
pub mod build;
/// Distance support functions: L2, inner product, cosine and L1.
pub mod distance;
/// Graph store trait and the in-memory arena graph.
pub mod graph;
/// Single-layer beam search and the multi-layer descent.
pub mod search;
/// Generation-based visited set for efficient graph traversal.
pub mod visited;

pub use build::{build_graph, GraphBuilder, InsertOutcome};
pub use distance::{Collation, DistanceMetric, DistanceOracle};
pub use graph::{GraphStore, HnswConfig, HnswGraph, NodeId};
pub use search::{find_candidates, search_layer, Candidate, ScanItems, SearchStats};
