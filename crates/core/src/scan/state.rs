//! Per-scan state owned by [`HnswScan`](super::HnswScan).

use crate::buffer::{BufferPool, PinnedBuffer};
use crate::hnsw::distance::{Collation, DistanceOracle};
use crate::hnsw::graph::{GraphStore, NodeId};
use crate::hnsw::search::{Candidate, SearchStats};
use crate::page::{BlockNumber, ItemPointer};

/// Where a scan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// No search has run since `begin` or the last `rescan`.
    Fresh,
    /// Candidates are pending.
    Primed,
    /// Every candidate has been consumed, or the query matches nothing.
    Exhausted,
}

/// A search result waiting to be returned, with the rows it still owes.
#[derive(Debug, Clone)]
pub struct PendingCandidate {
    pub node: NodeId,
    pub distance: f64,
    pub block: BlockNumber,
    /// Remaining heap tids, consumed from the back.
    pub heap_tids: Vec<ItemPointer>,
}

impl PendingCandidate {
    fn from_candidate<G: GraphStore + ?Sized>(graph: &G, candidate: Candidate) -> Self {
        Self {
            node: candidate.node,
            distance: candidate.distance,
            block: graph.block_number(candidate.node),
            heap_tids: graph.heap_tids(candidate.node).to_vec(),
        }
    }
}

/// A row handed out by [`ScanState::next_row`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRow {
    pub heap_tid: ItemPointer,
    pub node: NodeId,
    pub distance: f64,
}

pub struct ScanState<'a, P: BufferPool + ?Sized> {
    phase: ScanPhase,
    /// Sorted descending by distance: the nearest candidate is last.
    pending: Vec<PendingCandidate>,
    current_pin: Option<PinnedBuffer<'a, P>>,
    oracle: &'a dyn DistanceOracle,
    normalize: bool,
    collation: Collation,
    ef_search: usize,
    last_stats: Option<SearchStats>,
}

impl<'a, P: BufferPool + ?Sized> ScanState<'a, P> {
    pub fn new(oracle: &'a dyn DistanceOracle, collation: Collation, ef_search: usize) -> Self {
        Self {
            phase: ScanPhase::Fresh,
            pending: Vec::new(),
            current_pin: None,
            normalize: oracle.normalizes(),
            oracle,
            collation,
            ef_search,
            last_stats: None,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn oracle(&self) -> &'a dyn DistanceOracle {
        self.oracle
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn ef_search(&self) -> usize {
        self.ef_search
    }

    pub fn last_stats(&self) -> Option<&SearchStats> {
        self.last_stats.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Block of the page currently pinned, if any.
    pub fn pinned_block(&self) -> Option<BlockNumber> {
        self.current_pin.as_ref().and_then(|pin| pin.block())
    }

    /// Back to `Fresh`. The pin is kept until the next row replaces it.
    pub fn reset(&mut self) {
        self.phase = ScanPhase::Fresh;
        self.pending.clear();
        self.last_stats = None;
    }

    /// Mark the scan as matching nothing.
    pub fn exhaust(&mut self) {
        self.phase = ScanPhase::Exhausted;
        self.pending.clear();
    }

    /// Load the layer-0 result set. `candidates` are nearest first.
    pub fn prime<G: GraphStore + ?Sized>(
        &mut self,
        graph: &G,
        candidates: Vec<Candidate>,
        stats: SearchStats,
    ) {
        self.pending = candidates
            .into_iter()
            .rev()
            .map(|c| PendingCandidate::from_candidate(graph, c))
            .collect();
        self.last_stats = Some(stats);
        self.phase = ScanPhase::Primed;
    }

    /// Pop the next row, nearest candidate first. Candidates without rows are
    /// dropped. The page of the returned candidate stays pinned until the
    /// next call or until the state is dropped.
    pub fn next_row(&mut self, buffers: &'a P) -> Option<ScanRow> {
        if self.phase != ScanPhase::Primed {
            return None;
        }

        while let Some(top) = self.pending.last_mut() {
            let Some(heap_tid) = top.heap_tids.pop() else {
                self.pending.pop();
                continue;
            };
            let row = ScanRow {
                heap_tid,
                node: top.node,
                distance: top.distance,
            };
            let block = top.block;

            if let Some(previous) = self.current_pin.take() {
                tracing::trace!(
                    from = ?previous.block(),
                    to = block,
                    "Swapping index page pin"
                );
            }
            self.current_pin = Some(PinnedBuffer::acquire(buffers, block));
            return Some(row);
        }

        self.phase = ScanPhase::Exhausted;
        None
    }

    /// Release the pin and every pending candidate.
    pub fn release(&mut self) {
        self.current_pin = None;
        self.pending.clear();
    }
}
