//! Global configuration constants for the HNSW index scan.
//!
//! All tuning defaults, parameter limits, and page-layout sizes are defined here.
//! These are compile-time constants; per-scan configuration is carried by
//! [`ScanOptions`](crate::options::ScanOptions) and build configuration by
//! [`HnswConfig`](crate::hnsw::HnswConfig).

/// Default beam width (`ef`) used at layer 0 during a scan.
///
/// Controls the size of the candidate set during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 40;

/// Smallest accepted `ef_search`.
pub const HNSW_MIN_EF_SEARCH: usize = 1;

/// Largest accepted `ef_search`.
pub const HNSW_MAX_EF_SEARCH: usize = 1000;

/// Default number of bidirectional links per node above layer 0.
///
/// Layer 0 allows twice as many. Typical range: 8–64.
pub const HNSW_DEFAULT_M: usize = 16;

/// Smallest accepted `m`.
pub const HNSW_MIN_M: usize = 2;

/// Largest accepted `m`.
pub const HNSW_MAX_M: usize = 100;

/// Default candidate list size during graph construction.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 64;

/// Smallest accepted `ef_construction`.
pub const HNSW_MIN_EF_CONSTRUCTION: usize = 4;

/// Largest accepted `ef_construction`.
pub const HNSW_MAX_EF_CONSTRUCTION: usize = 1000;

/// Highest level a node can be assigned.
pub const HNSW_MAX_LEVEL: usize = 15;

/// Maximum number of heap row identifiers kept on one element.
///
/// Rows carrying an identical vector share an element until it is full.
pub const HNSW_HEAPTIDS: usize = 10;

/// Maximum vector dimension accepted by the builder.
pub const HNSW_MAX_DIM: usize = 2000;

/// Seed for level assignment when the builder is not given one.
pub const HNSW_DEFAULT_SEED: u64 = 0x5eed_4a5e;

/// Default working-memory budget for graph construction (64 MiB).
pub const DEFAULT_MAINTENANCE_MEMORY_BYTES: usize = 64 * 1024 * 1024;

/// Index page size in bytes.
pub const BLCKSZ: usize = 8192;

/// Block holding the index meta page. Elements start at the next block.
pub const HNSW_METAPAGE_BLKNO: u32 = 0;

/// Page header plus special space reserved on every element page.
pub const PAGE_OVERHEAD_BYTES: usize = 24 + 8;

/// Line pointer size, one per tuple on a page.
pub const ITEM_ID_BYTES: usize = 4;

/// Fixed part of an element tuple: type, level, deleted, version,
/// the heap tid array, the neighbor tuple pointer and padding.
pub const ELEMENT_TUPLE_HEADER_BYTES: usize = 4 + HNSW_HEAPTIDS * 6 + 6 + 2;

/// Varlena header of a stored vector (length, dimension, unused).
pub const VECTOR_HEADER_BYTES: usize = 8;

/// Fixed part of a neighbor tuple.
pub const NEIGHBOR_TUPLE_HEADER_BYTES: usize = 4;

/// Size of one neighbor reference inside a neighbor tuple.
pub const NEIGHBOR_ITEM_BYTES: usize = 6;

/// Maximum alignment used when sizing tuples.
pub const MAXALIGN: usize = 8;
