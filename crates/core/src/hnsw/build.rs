//! Serial HNSW graph construction.
//!
//! Inserts vectors one at a time with bidirectional connections and heuristic
//! neighbor pruning (Algorithm 4 from the HNSW paper). While the graph fits in
//! the memory budget, each neighbor list keeps the distances of its entries so
//! pruning never recomputes them. Once the budget is exceeded the cache is
//! dropped and pruning falls back to computing distances from the vectors.

use crate::config;
use crate::error::BuildError;
use crate::hnsw::distance::{Collation, DistanceMetric};
use crate::hnsw::graph::{GraphStore, HnswConfig, HnswGraph, NodeId};
use crate::hnsw::search::{search_layer, Candidate, SearchContext};
use crate::hnsw::visited::VisitedSet;
use crate::page::ItemPointer;
use crate::relation::OperatorClass;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;

/// What happened to one inserted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new element was added to the graph.
    Inserted(NodeId),
    /// The row's vector already existed; its tid was added to that element.
    Duplicate(NodeId),
    /// The row cannot be indexed (its vector cannot be normalized).
    Skipped,
}

/// Builds an [`HnswGraph`] from `(tid, vector)` rows.
pub struct GraphBuilder {
    graph: HnswGraph,
    opclass: OperatorClass,
    metric: DistanceMetric,
    rng: StdRng,
    visited: VisitedSet,
    /// Distances parallel to `graph.neighbors`; `None` once over budget.
    neighbor_distances: Option<Vec<Vec<Vec<f64>>>>,
    memory_budget: usize,
    memory_used: usize,
    tuples: usize,
}

impl GraphBuilder {
    /// Creates a builder for `dimension`-wide vectors under `opclass`.
    pub fn new(
        dimension: usize,
        config: HnswConfig,
        opclass: OperatorClass,
    ) -> Result<Self, BuildError> {
        if dimension == 0 || dimension > config::HNSW_MAX_DIM {
            return Err(BuildError::InvalidDimension {
                actual: dimension,
                max: config::HNSW_MAX_DIM,
            });
        }
        config.validate()?;
        Ok(Self {
            graph: HnswGraph::new(dimension, config),
            opclass,
            metric: opclass.metric(),
            rng: StdRng::seed_from_u64(config::HNSW_DEFAULT_SEED),
            visited: VisitedSet::new(0),
            neighbor_distances: Some(Vec::new()),
            memory_budget: config::DEFAULT_MAINTENANCE_MEMORY_BYTES,
            memory_used: 0,
            tuples: 0,
        })
    }

    /// Working-memory budget in bytes for the graph and its distance cache.
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Seed for level assignment.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn opclass(&self) -> OperatorClass {
        self.opclass
    }

    /// Rows accepted so far (inserted or merged as duplicates).
    pub fn tuples(&self) -> usize {
        self.tuples
    }

    /// Estimated bytes held by the graph and, while active, the distance cache.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Whether neighbor distances are still cached.
    pub fn caches_distances(&self) -> bool {
        self.neighbor_distances.is_some()
    }

    pub fn graph(&self) -> &HnswGraph {
        &self.graph
    }

    pub fn finish(self) -> HnswGraph {
        tracing::debug!(
            nodes = self.graph.len(),
            tuples = self.tuples,
            pages = self.graph.page_count(),
            max_level = self.graph.max_level,
            "HNSW graph built"
        );
        self.graph
    }

    /// Draw a level from the exponential distribution with `mL = 1 / ln(M)`.
    fn random_level(&mut self) -> usize {
        let ml = 1.0 / (self.graph.config.m as f64).ln();
        // (0, 1] so the logarithm stays finite
        let r: f64 = 1.0 - self.rng.gen::<f64>();
        let level = (-r.ln() * ml).floor() as usize;
        level.min(config::HNSW_MAX_LEVEL)
    }

    fn node_bytes(&self, level: usize, cached: bool) -> usize {
        let slots = (level + 2) * self.graph.config.m;
        let mut bytes = self.graph.dimension * 4
            + slots * std::mem::size_of::<NodeId>()
            + config::HNSW_HEAPTIDS * std::mem::size_of::<ItemPointer>();
        if cached {
            bytes += slots * std::mem::size_of::<f64>();
        }
        bytes
    }

    fn cache_bytes(&self) -> usize {
        self.graph
            .levels
            .iter()
            .map(|&l| (l as usize + 2) * self.graph.config.m * std::mem::size_of::<f64>())
            .sum()
    }

    fn account(&mut self, level: usize) {
        self.memory_used += self.node_bytes(level, self.neighbor_distances.is_some());
        if self.neighbor_distances.is_some() && self.memory_used > self.memory_budget {
            self.memory_used -= self.cache_bytes();
            self.neighbor_distances = None;
            tracing::info!(
                tuples = self.tuples,
                budget_bytes = self.memory_budget,
                "hnsw graph no longer fits into the memory budget, recomputing neighbor distances"
            );
        }
    }

    /// Insert one row.
    pub fn insert(&mut self, tid: ItemPointer, value: &[f32]) -> Result<InsertOutcome, BuildError> {
        let dimension = self.graph.dimension;
        if value.len() != dimension {
            return Err(BuildError::DimensionMismatch {
                expected: dimension,
                actual: value.len(),
            });
        }
        if let Some(index) = value.iter().position(|x| !x.is_finite()) {
            return Err(BuildError::NonFiniteValue { index });
        }

        let vector: Cow<'_, [f32]> = if self.opclass.normalizes() {
            match crate::hnsw::distance::normalize(value) {
                Ok(v) => Cow::Owned(v),
                Err(_) => return Ok(InsertOutcome::Skipped),
            }
        } else {
            Cow::Borrowed(value)
        };

        let level = self.random_level();

        let entry_point = match self.graph.entry_point {
            Some(ep) => ep,
            None => {
                let id = self.push(&vector, level, tid);
                return Ok(InsertOutcome::Inserted(id));
            }
        };

        let max_level = self.graph.max_level;
        let config = self.graph.config;
        let top = level.min(max_level);

        // Phase 1: greedy descent above the new node's level, then collect
        // ef_construction candidates per layer it joins
        let mut layer_candidates: Vec<Vec<Candidate>> = vec![Vec::new(); top + 1];
        {
            let ctx = SearchContext::new(&self.graph, &self.metric, Collation::NONE, &vector);
            let mut ep = vec![ctx.candidate(entry_point)];
            for layer in (level + 1..=max_level).rev() {
                let w = search_layer(&ctx, &ep, 1, layer, &mut self.visited);
                if !w.is_empty() {
                    ep = w;
                }
            }
            for layer in (0..=top).rev() {
                let w = search_layer(&ctx, &ep, config.ef_construction, layer, &mut self.visited);
                if !w.is_empty() {
                    ep = w.clone();
                }
                layer_candidates[layer] = w;
            }
        }

        // Identical vectors share one element while it has room for more tids
        for c in &layer_candidates[0] {
            if self.graph.get_vector(c.node) != &*vector {
                continue;
            }
            let tids = &mut self.graph.heap_tids[c.node as usize];
            if tids.len() < config::HNSW_HEAPTIDS {
                tids.push(tid);
                self.tuples += 1;
                return Ok(InsertOutcome::Duplicate(c.node));
            }
        }

        // Phase 2: pick neighbors for the new node on every layer it joins
        let selected: Vec<Vec<Candidate>> = layer_candidates
            .iter()
            .enumerate()
            .map(|(layer, cands)| self.select_neighbors(cands, config.max_neighbors(layer)))
            .collect();

        let id = self.push(&vector, level, tid);
        for (layer, chosen) in selected.iter().enumerate() {
            self.graph
                .set_neighbors(id, layer, chosen.iter().map(|c| c.node).collect());
            if let Some(cache) = self.neighbor_distances.as_mut() {
                cache[id as usize][layer] = chosen.iter().map(|c| c.distance).collect();
            }
        }

        // Phase 3: add reverse links and prune lists that overflow
        for (layer, chosen) in selected.iter().enumerate() {
            for c in chosen {
                self.add_reverse_link(c.node, Candidate::new(id, c.distance), layer);
            }
        }

        Ok(InsertOutcome::Inserted(id))
    }

    fn push(&mut self, vector: &[f32], level: usize, tid: ItemPointer) -> NodeId {
        let id = self.graph.push_node(vector, level, vec![tid]);
        if let Some(cache) = self.neighbor_distances.as_mut() {
            cache.push(vec![Vec::new(); level + 1]);
        }
        self.tuples += 1;
        self.account(level);
        id
    }

    fn add_reverse_link(&mut self, node: NodeId, new: Candidate, layer: usize) {
        let m_max = self.graph.config.max_neighbors(layer);
        let idx = node as usize;

        if self.graph.neighbors[idx][layer].len() < m_max {
            self.graph.neighbors[idx][layer].push(new.node);
            if let Some(cache) = self.neighbor_distances.as_mut() {
                cache[idx][layer].push(new.distance);
            }
            return;
        }

        let mut candidates: Vec<Candidate> = match &self.neighbor_distances {
            Some(cache) => self.graph.neighbors[idx][layer]
                .iter()
                .zip(&cache[idx][layer])
                .map(|(&n, &d)| Candidate::new(n, d))
                .collect(),
            None => {
                let base = self.graph.get_vector(node);
                self.graph.neighbors[idx][layer]
                    .iter()
                    .map(|&n| Candidate::new(n, self.metric.distance(base, self.graph.get_vector(n))))
                    .collect()
            }
        };
        candidates.push(new);

        let pruned = self.select_neighbors(&candidates, m_max);
        self.graph.neighbors[idx][layer] = pruned.iter().map(|c| c.node).collect();
        if let Some(cache) = self.neighbor_distances.as_mut() {
            cache[idx][layer] = pruned.iter().map(|c| c.distance).collect();
        }
    }

    /// Heuristic neighbor selection (Algorithm 4 from the HNSW paper).
    /// A candidate is kept only if it is closer to the base node than to every
    /// neighbor already kept; remaining slots are then filled with the closest
    /// pruned candidates.
    fn select_neighbors(&self, candidates: &[Candidate], m: usize) -> Vec<Candidate> {
        let mut sorted = candidates.to_vec();
        sorted.sort_unstable();

        let mut selected: Vec<Candidate> = Vec::with_capacity(m);
        let mut pruned: Vec<Candidate> = Vec::new();

        for &c in &sorted {
            if selected.len() >= m {
                break;
            }
            let cv = self.graph.get_vector(c.node);
            let is_diverse = selected.iter().all(|s| {
                c.distance <= self.metric.distance(cv, self.graph.get_vector(s.node))
            });
            if is_diverse {
                selected.push(c);
            } else {
                pruned.push(c);
            }
        }

        for c in pruned {
            if selected.len() >= m {
                break;
            }
            selected.push(c);
        }

        selected
    }
}

/// Builds a graph from `rows` in one call.
pub fn build_graph<'v, I>(
    dimension: usize,
    config: HnswConfig,
    opclass: OperatorClass,
    memory_budget: Option<usize>,
    rows: I,
) -> Result<HnswGraph, BuildError>
where
    I: IntoIterator<Item = (ItemPointer, &'v [f32])>,
{
    let mut builder = GraphBuilder::new(dimension, config, opclass)?;
    if let Some(bytes) = memory_budget {
        builder = builder.with_memory_budget(bytes);
    }
    for (tid, value) in rows {
        builder.insert(tid, value)?;
    }
    Ok(builder.finish())
}
