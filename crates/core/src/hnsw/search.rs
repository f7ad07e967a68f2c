//! HNSW search algorithms: single-layer beam search and the multi-layer descent.
//!
//! Candidates are totally ordered by `(distance, node id)`, so searches over an
//! unchanged graph resolve distance ties the same way on every run. NaN
//! distances sort after every finite distance.

use crate::hnsw::distance::{Collation, DistanceOracle};
use crate::hnsw::graph::{GraphStore, NodeId};
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

thread_local! {
    /// Thread-local VisitedSet reused across scans on the same thread.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// A graph node paired with its distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub node: NodeId,
    pub distance: f64,
}

impl Candidate {
    pub fn new(node: NodeId, distance: f64) -> Self {
        Self { node, distance }
    }

    #[inline]
    fn key(&self) -> (OrderedFloat<f64>, NodeId) {
        (OrderedFloat(self.distance), self.node)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Everything a layer search needs to price a node.
pub struct SearchContext<'a, G: ?Sized, D: ?Sized> {
    pub graph: &'a G,
    pub oracle: &'a D,
    pub collation: Collation,
    pub query: &'a [f32],
}

impl<'a, G, D> SearchContext<'a, G, D>
where
    G: GraphStore + ?Sized,
    D: DistanceOracle + ?Sized,
{
    pub fn new(graph: &'a G, oracle: &'a D, collation: Collation, query: &'a [f32]) -> Self {
        Self {
            graph,
            oracle,
            collation,
            query,
        }
    }

    /// Distance from the query to `node`.
    #[inline]
    pub fn distance(&self, node: NodeId) -> f64 {
        self.oracle
            .distance(self.collation, self.query, self.graph.vector(node))
    }

    /// Candidate for `node` with its distance computed.
    #[inline]
    pub fn candidate(&self, node: NodeId) -> Candidate {
        Candidate::new(node, self.distance(node))
    }
}

/// Pushes `candidate` into the bounded result set if it belongs there.
/// When full, the worst entry is evicted only if `candidate` is strictly closer.
#[inline]
fn offer(results: &mut BinaryHeap<Candidate>, candidate: Candidate, ef: usize) -> bool {
    if results.len() < ef {
        results.push(candidate);
        return true;
    }
    match results.peek() {
        Some(worst) if candidate < *worst => {
            results.pop();
            results.push(candidate);
            true
        }
        _ => false,
    }
}

/// Search a single layer of the graph.
///
/// Returns up to `ef` candidates sorted ascending by `(distance, node id)`.
/// `entry` distances must already be computed. `visited` is cleared at the
/// start of the call and afterwards holds every node whose distance was
/// computed, entry points included.
pub fn search_layer<G, D>(
    ctx: &SearchContext<'_, G, D>,
    entry: &[Candidate],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<Candidate>
where
    G: GraphStore + ?Sized,
    D: DistanceOracle + ?Sized,
{
    visited.clear();
    if ef == 0 || entry.is_empty() {
        return Vec::new();
    }
    let node_count = ctx.graph.node_count();
    visited.ensure_capacity(node_count);

    let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef + 1);

    for &ep in entry {
        if visited.insert(ep.node) {
            frontier.push(Reverse(ep));
            offer(&mut results, ep, ef);
        }
    }

    while let Some(Reverse(c)) = frontier.pop() {
        // Nothing reachable from a candidate farther than a full result set's worst can improve it
        if results.len() >= ef {
            if let Some(worst) = results.peek() {
                if OrderedFloat(c.distance) > OrderedFloat(worst.distance) {
                    break;
                }
            }
        }

        for &neighbor in ctx.graph.neighbors(c.node, layer) {
            // Dangling ids are skipped like any other ill-formed link
            if neighbor as usize >= node_count
                || ctx.graph.level(neighbor) < layer
                || !visited.insert(neighbor)
            {
                continue;
            }
            let e = ctx.candidate(neighbor);
            // Every new neighbor is expanded later, even one losing a distance tie to W's worst
            frontier.push(Reverse(e));
            offer(&mut results, e, ef);
        }
    }

    results.into_sorted_vec()
}

/// Counters from one multi-layer search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Level of the entry point the search started from.
    pub entry_level: usize,
    /// Distinct nodes visited across layers above 0.
    pub upper_visited: usize,
    /// Distinct nodes visited at layer 0.
    pub base_visited: usize,
}

impl SearchStats {
    /// Every distance computation made by the search.
    pub fn distance_computations(&self) -> usize {
        self.upper_visited + self.base_visited
    }
}

/// Result of [`find_candidates`]: the layer-0 candidate set, nearest first.
#[derive(Debug, Clone, Default)]
pub struct ScanItems {
    pub candidates: Vec<Candidate>,
    pub stats: SearchStats,
}

/// Multi-layer search from the entry point down to layer 0.
///
/// Layers above 0 are searched with `ef = 1`, carrying the single best node
/// down as the next entry. Layer 0 is searched with `ef_search`. An empty
/// graph yields no candidates.
pub fn find_candidates<G, D>(
    graph: &G,
    oracle: &D,
    collation: Collation,
    query: &[f32],
    ef_search: usize,
) -> ScanItems
where
    G: GraphStore + ?Sized,
    D: DistanceOracle + ?Sized,
{
    let entry_point = match graph.entry_point() {
        Some(ep) if (ep as usize) < graph.node_count() => ep,
        _ => return ScanItems::default(),
    };

    SEARCH_VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.ensure_capacity(graph.node_count());

        let ctx = SearchContext::new(graph, oracle, collation, query);
        let entry_level = graph.level(entry_point);
        let mut stats = SearchStats {
            entry_level,
            ..SearchStats::default()
        };

        let mut ep = vec![ctx.candidate(entry_point)];
        for layer in (1..=entry_level).rev() {
            let w = search_layer(&ctx, &ep, 1, layer, &mut *visited);
            stats.upper_visited += visited.len();
            if !w.is_empty() {
                ep = w;
            }
        }

        let candidates = search_layer(&ctx, &ep, ef_search, 0, &mut *visited);
        stats.base_visited = visited.len();

        tracing::debug!(
            entry_level = stats.entry_level,
            upper_visited = stats.upper_visited,
            base_visited = stats.base_visited,
            candidates = candidates.len(),
            ef_search,
            "HNSW search completed"
        );

        ScanItems { candidates, stats }
    })
}
