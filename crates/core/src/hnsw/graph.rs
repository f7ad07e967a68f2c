//! HNSW graph structure and configuration.
//!
//! [`GraphStore`] is everything a scan reads from the graph. [`HnswGraph`] is
//! the in-memory implementation, stored Struct-of-Arrays: vectors live
//! contiguously in one arena, with separate arrays for neighbor lists,
//! levels, heap tids and page placement. Nodes are addressed by dense
//! [`NodeId`]s, so neighbor lists hold ids rather than references.

use crate::config;
use crate::error::BuildError;
use crate::page::{BlockNumber, ItemPointer, PageAllocator};
use serde::{Deserialize, Serialize};

/// Dense index of a graph element.
pub type NodeId = u32;

/// Read-only view of a multi-layer proximity graph.
///
/// Levels and neighbor lists must not change while a scan holds the store.
/// Searches ignore neighbor ids at or past `node_count()` and an entry point
/// outside the graph.
pub trait GraphStore {
    /// The node at the highest level, or `None` for an empty index.
    fn entry_point(&self) -> Option<NodeId>;

    /// Number of nodes; also the exclusive upper bound of node ids.
    fn node_count(&self) -> usize;

    /// Dimension of every stored vector.
    fn dimension(&self) -> usize;

    /// Highest layer `id` is present in.
    fn level(&self, id: NodeId) -> usize;

    /// Neighbors of `id` at `layer`. Empty when `layer` is above the node's level.
    fn neighbors(&self, id: NodeId, layer: usize) -> &[NodeId];

    fn vector(&self, id: NodeId) -> &[f32];

    /// Heap rows carrying this node's vector. May be empty after rows were deleted.
    fn heap_tids(&self, id: NodeId) -> &[ItemPointer];

    /// Index page holding the node's element tuple.
    fn block_number(&self, id: NodeId) -> BlockNumber;
}

/// Build parameters of an HNSW graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Links per node above layer 0. Layer 0 allows `2 * m`.
    pub m: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
}

impl HnswConfig {
    /// Maximum neighbors kept at `layer`.
    #[inline]
    pub fn max_neighbors(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if !(config::HNSW_MIN_M..=config::HNSW_MAX_M).contains(&self.m) {
            return Err(BuildError::InvalidParameter(format!(
                "m must be between {} and {}, got {}",
                config::HNSW_MIN_M,
                config::HNSW_MAX_M,
                self.m
            )));
        }
        if !(config::HNSW_MIN_EF_CONSTRUCTION..=config::HNSW_MAX_EF_CONSTRUCTION)
            .contains(&self.ef_construction)
        {
            return Err(BuildError::InvalidParameter(format!(
                "ef_construction must be between {} and {}, got {}",
                config::HNSW_MIN_EF_CONSTRUCTION,
                config::HNSW_MAX_EF_CONSTRUCTION,
                self.ef_construction
            )));
        }
        if self.ef_construction < 2 * self.m {
            return Err(BuildError::InvalidParameter(format!(
                "ef_construction must be greater than or equal to 2 * m, got {} < {}",
                self.ef_construction,
                2 * self.m
            )));
        }
        Ok(())
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
        }
    }
}

/// In-memory HNSW graph in Struct-of-Arrays layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswGraph {
    pub config: HnswConfig,
    pub dimension: usize,
    // SoA: vector arena, `dimension` floats per node
    pub vectors: Vec<f32>,
    // SoA: graph structure
    pub neighbors: Vec<Vec<Vec<NodeId>>>, // [node_id][layer][neighbor_ids]
    pub levels: Vec<u8>,
    pub heap_tids: Vec<Vec<ItemPointer>>,
    pub blocks: Vec<BlockNumber>,
    pub entry_point: Option<NodeId>,
    pub max_level: usize,
    pages: PageAllocator,
}

impl HnswGraph {
    /// Creates an empty graph for `dimension`-wide vectors.
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        Self {
            config,
            dimension,
            vectors: Vec::new(),
            neighbors: Vec::new(),
            levels: Vec::new(),
            heap_tids: Vec::new(),
            blocks: Vec::new(),
            entry_point: None,
            max_level: 0,
            pages: PageAllocator::new(),
        }
    }

    /// Number of nodes, including those whose rows were all deleted.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of heap rows still referenced by the graph.
    pub fn tuple_count(&self) -> usize {
        self.heap_tids.iter().map(Vec::len).sum()
    }

    /// Number of index pages holding elements.
    pub fn page_count(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.pages.pages()
        }
    }

    /// Appends a node with empty neighbor lists for layers `0..=level`.
    /// `level` is capped at [`config::HNSW_MAX_LEVEL`]. The first node becomes
    /// the entry point; later ones only when they reach a new top level.
    pub fn push_node(&mut self, vector: &[f32], level: usize, heap_tids: Vec<ItemPointer>) -> NodeId {
        debug_assert_eq!(vector.len(), self.dimension);
        let level = level.min(config::HNSW_MAX_LEVEL);
        let id = self.levels.len() as NodeId;
        self.vectors.extend_from_slice(vector);
        self.neighbors.push(vec![Vec::new(); level + 1]);
        self.levels.push(level as u8);
        self.heap_tids.push(heap_tids);
        self.blocks
            .push(self.pages.allocate(self.dimension, level, self.config.m));
        if self.entry_point.is_none() || level > self.max_level {
            self.entry_point = Some(id);
            self.max_level = level;
        }
        id
    }

    /// Vector slice for `id`. O(1) slice into the arena.
    #[inline]
    pub fn get_vector(&self, id: NodeId) -> &[f32] {
        let start = id as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Replaces the neighbor list of `id` at `layer`.
    pub fn set_neighbors(&mut self, id: NodeId, layer: usize, neighbors: Vec<NodeId>) {
        let lists = &mut self.neighbors[id as usize];
        while lists.len() <= layer {
            lists.push(Vec::new());
        }
        lists[layer] = neighbors;
    }

    /// Links `a` and `b` both ways at `layer`, ignoring duplicates.
    pub fn connect(&mut self, a: NodeId, b: NodeId, layer: usize) {
        for (from, to) in [(a, b), (b, a)] {
            let lists = &mut self.neighbors[from as usize];
            while lists.len() <= layer {
                lists.push(Vec::new());
            }
            if !lists[layer].contains(&to) {
                lists[layer].push(to);
            }
        }
    }

    /// Forgets a heap row. The element stays in the graph for navigation.
    /// Returns `false` if no node referenced `tid`.
    pub fn remove_heap_tid(&mut self, tid: ItemPointer) -> bool {
        for tids in &mut self.heap_tids {
            if let Some(pos) = tids.iter().position(|t| *t == tid) {
                tids.remove(pos);
                return true;
            }
        }
        false
    }

    /// Check internal invariants: parallel array lengths, entry point and
    /// neighbor ids in bounds, and no neighbor list above a node's level.
    pub fn validate(&self) -> Result<(), String> {
        let nc = self.len();

        if self.vectors.len() != nc * self.dimension {
            return Err(format!(
                "vectors length {} != node_count({}) * dimension({})",
                self.vectors.len(),
                nc,
                self.dimension
            ));
        }
        if self.neighbors.len() != nc {
            return Err(format!("neighbors length {} != node_count {}", self.neighbors.len(), nc));
        }
        if self.heap_tids.len() != nc {
            return Err(format!("heap_tids length {} != node_count {}", self.heap_tids.len(), nc));
        }
        if self.blocks.len() != nc {
            return Err(format!("blocks length {} != node_count {}", self.blocks.len(), nc));
        }

        match self.entry_point {
            Some(ep) if ep as usize >= nc => {
                return Err(format!("entry_point {} >= node_count {}", ep, nc));
            }
            Some(ep) if self.levels[ep as usize] as usize != self.max_level => {
                return Err(format!(
                    "entry_point level {} != max_level {}",
                    self.levels[ep as usize], self.max_level
                ));
            }
            None if nc > 0 => return Err("non-empty graph without entry point".to_string()),
            _ => {}
        }

        for (node_id, node_neighbors) in self.neighbors.iter().enumerate() {
            let level = self.levels[node_id] as usize;
            if node_neighbors.len() > level + 1 {
                return Err(format!(
                    "node {} has {} neighbor layers but level {}",
                    node_id,
                    node_neighbors.len(),
                    level
                ));
            }
            for (layer, layer_neighbors) in node_neighbors.iter().enumerate() {
                for &neighbor in layer_neighbors {
                    if neighbor as usize >= nc {
                        return Err(format!(
                            "neighbor {} out of bounds (node_count={}) at node {} layer {}",
                            neighbor, nc, node_id, layer
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

impl GraphStore for HnswGraph {
    fn entry_point(&self) -> Option<NodeId> {
        self.entry_point
    }

    fn node_count(&self) -> usize {
        self.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn level(&self, id: NodeId) -> usize {
        self.levels[id as usize] as usize
    }

    #[inline]
    fn neighbors(&self, id: NodeId, layer: usize) -> &[NodeId] {
        self.neighbors[id as usize]
            .get(layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[inline]
    fn vector(&self, id: NodeId) -> &[f32] {
        self.get_vector(id)
    }

    fn heap_tids(&self, id: NodeId) -> &[ItemPointer] {
        &self.heap_tids[id as usize]
    }

    fn block_number(&self, id: NodeId) -> BlockNumber {
        self.blocks[id as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u16) -> ItemPointer {
        ItemPointer::new(0, n)
    }

    #[test]
    fn test_first_node_is_entry_point() {
        let mut g = HnswGraph::new(2, HnswConfig::default());
        assert_eq!(g.entry_point(), None);
        let a = g.push_node(&[0.0, 0.0], 0, vec![tid(1)]);
        assert_eq!(g.entry_point(), Some(a));
        let b = g.push_node(&[1.0, 0.0], 2, vec![tid(2)]);
        assert_eq!(g.entry_point(), Some(b));
        assert_eq!(g.max_level, 2);
        let _ = g.push_node(&[2.0, 0.0], 1, vec![tid(3)]);
        assert_eq!(g.entry_point(), Some(b));
        assert!(g.validate().is_ok());
    }

    #[test]
    fn test_level_is_capped() {
        let mut g = HnswGraph::new(1, HnswConfig::default());
        let id = g.push_node(&[0.0], 300, vec![tid(1)]);
        assert_eq!(g.level(id), config::HNSW_MAX_LEVEL);
        assert_eq!(g.neighbors[id as usize].len(), config::HNSW_MAX_LEVEL + 1);
        assert_eq!(g.max_level, config::HNSW_MAX_LEVEL);
        g.validate().unwrap();
    }

    #[test]
    fn test_neighbors_above_level_are_empty() {
        let mut g = HnswGraph::new(1, HnswConfig::default());
        let a = g.push_node(&[0.0], 1, vec![tid(1)]);
        let b = g.push_node(&[1.0], 0, vec![tid(2)]);
        g.connect(a, b, 0);
        assert_eq!(g.neighbors(a, 0), &[b]);
        assert_eq!(g.neighbors(b, 0), &[a]);
        assert!(g.neighbors(a, 1).is_empty());
        assert!(g.neighbors(b, 5).is_empty());
    }

    #[test]
    fn test_connect_ignores_duplicates() {
        let mut g = HnswGraph::new(1, HnswConfig::default());
        let a = g.push_node(&[0.0], 0, vec![tid(1)]);
        let b = g.push_node(&[1.0], 0, vec![tid(2)]);
        g.connect(a, b, 0);
        g.connect(b, a, 0);
        assert_eq!(g.neighbors(a, 0).len(), 1);
        assert_eq!(g.neighbors(b, 0).len(), 1);
    }

    #[test]
    fn test_remove_heap_tid_keeps_node() {
        let mut g = HnswGraph::new(1, HnswConfig::default());
        let a = g.push_node(&[0.0], 0, vec![tid(1), tid(2)]);
        assert!(g.remove_heap_tid(tid(1)));
        assert!(!g.remove_heap_tid(tid(1)));
        assert_eq!(g.heap_tids(a), &[tid(2)]);
        assert!(g.remove_heap_tid(tid(2)));
        assert!(g.heap_tids(a).is_empty());
        assert_eq!(g.len(), 1);
        assert_eq!(g.tuple_count(), 0);
    }

    #[test]
    fn test_validate_rejects_out_of_bounds_neighbor() {
        let mut g = HnswGraph::new(1, HnswConfig::default());
        let a = g.push_node(&[0.0], 0, vec![tid(1)]);
        g.set_neighbors(a, 0, vec![7]);
        let err = g.validate().unwrap_err();
        assert!(err.contains("out of bounds"), "{err}");
    }

    #[test]
    fn test_config_validation() {
        assert!(HnswConfig::default().validate().is_ok());
        let bad_m = HnswConfig { m: 1, ef_construction: 64 };
        assert!(bad_m.validate().is_err());
        let small_ef = HnswConfig { m: 16, ef_construction: 20 };
        assert!(small_ef.validate().is_err());
    }

    #[test]
    fn test_blocks_start_after_meta_page() {
        let mut g = HnswGraph::new(10, HnswConfig::default());
        for i in 0..200u16 {
            g.push_node(&[i as f32; 10], 0, vec![tid(i + 1)]);
        }
        assert_eq!(g.block_number(0), 1);
        assert!(g.block_number(199) > 1);
        assert!(g.blocks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(g.page_count(), g.block_number(199) as usize);
    }
}
