//! Ordered index scans.
//!
//! [`HnswScan`] is the pull iterator the executor drives: `begin`, then any
//! number of `rescan` / `get_next_tuple` rounds, then `end`. The first pull
//! after `begin` or `rescan` runs the graph search; each later pull hands out
//! one heap row identifier, nearest element first.

pub mod state;

pub use state::{PendingCandidate, ScanPhase, ScanRow, ScanState};

use crate::buffer::BufferPool;
use crate::error::{Result, ScanError};
use crate::hnsw::distance::Collation;
use crate::hnsw::graph::GraphStore;
use crate::hnsw::search::{find_candidates, SearchStats};
use crate::options::ScanOptions;
use crate::page::ItemPointer;
use crate::relation::IndexRelation;
use crate::stats;
use std::borrow::Cow;

/// Direction requested by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
    NoMovement,
}

/// A scan key or ordering key. `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanKey {
    pub argument: Option<Vec<f32>>,
}

impl ScanKey {
    pub fn null() -> Self {
        Self { argument: None }
    }

    pub fn vector(value: impl Into<Vec<f32>>) -> Self {
        Self {
            argument: Some(value.into()),
        }
    }

    pub fn is_null(&self) -> bool {
        self.argument.is_none()
    }
}

/// One scan over an HNSW index.
///
/// At most one index page is pinned at any time, the page holding the
/// element of the row last returned. The pin is released when the next row
/// is fetched, when the scan ends, or when the scan is dropped.
pub struct HnswScan<'a, G: GraphStore, P: BufferPool + ?Sized> {
    relation: &'a IndexRelation<G>,
    buffers: &'a P,
    key_data: Vec<ScanKey>,
    order_by_data: Vec<ScanKey>,
    heap_tid: Option<ItemPointer>,
    distance: Option<f64>,
    state: ScanState<'a, P>,
}

impl<'a, G: GraphStore, P: BufferPool + ?Sized> HnswScan<'a, G, P> {
    /// Open a scan with room for `nkeys` scan keys and `norderbys` ordering
    /// keys. Nothing is searched or pinned until the first pull.
    pub fn begin(
        relation: &'a IndexRelation<G>,
        buffers: &'a P,
        nkeys: usize,
        norderbys: usize,
        options: ScanOptions,
    ) -> Self {
        Self {
            relation,
            buffers,
            key_data: vec![ScanKey::null(); nkeys],
            order_by_data: vec![ScanKey::null(); norderbys],
            heap_tid: None,
            distance: None,
            state: ScanState::new(relation.oracle(), relation.collation(), options.ef_search),
        }
    }

    /// Restart with new keys. Copies at most as many keys as were declared
    /// at `begin`, and discards any pending results.
    pub fn rescan(&mut self, keys: &[ScanKey], orderbys: &[ScanKey]) {
        self.state.reset();
        self.heap_tid = None;
        self.distance = None;

        for (slot, key) in self.key_data.iter_mut().zip(keys) {
            slot.clone_from(key);
        }
        for (slot, key) in self.order_by_data.iter_mut().zip(orderbys) {
            slot.clone_from(key);
        }
    }

    /// Advance to the next row. Returns `Ok(false)` once the scan is out of
    /// rows; the row itself is read through [`heap_tid`](Self::heap_tid).
    pub fn get_next_tuple(&mut self, direction: ScanDirection) -> Result<bool> {
        if direction != ScanDirection::Forward {
            return Err(ScanError::UnsupportedDirection(direction));
        }

        if self.state.phase() == ScanPhase::Fresh {
            self.prime()?;
        }

        match self.state.next_row(self.buffers) {
            Some(row) => {
                self.heap_tid = Some(row.heap_tid);
                self.distance = Some(row.distance);
                stats::record_heap_tid_returned(self.opclass_name());
                Ok(true)
            }
            None => {
                self.heap_tid = None;
                self.distance = None;
                Ok(false)
            }
        }
    }

    fn prime(&mut self) -> Result<()> {
        stats::record_index_scan(self.opclass_name());

        let query = match self.order_by_data.as_slice() {
            [] => return Err(ScanError::MissingOrderBy),
            [key] => key.argument.as_deref(),
            keys => return Err(ScanError::UnsupportedOrderByCount(keys.len())),
        };

        let Some(query) = query else {
            tracing::debug!("Null order by value, scan returns no rows");
            self.state.exhaust();
            return Ok(());
        };

        let graph = self.relation.graph();
        if graph.entry_point().is_some() && query.len() != graph.dimension() {
            return Err(ScanError::DimensionMismatch {
                expected: graph.dimension(),
                actual: query.len(),
            });
        }

        let oracle = self.state.oracle();
        let collation = self.state.collation();
        let query: Cow<'_, [f32]> = if self.state.normalize() {
            match oracle.normalize(collation, query) {
                Ok(normalized) => Cow::Owned(normalized),
                Err(err) => {
                    tracing::debug!(norm = err.norm, "Query cannot be normalized, scan returns no rows");
                    self.state.exhaust();
                    return Ok(());
                }
            }
        } else {
            Cow::Borrowed(query)
        };

        let items = find_candidates(graph, oracle, collation, &query, self.state.ef_search());
        self.state.prime(graph, items.candidates, items.stats);
        Ok(())
    }

    /// Row identifier produced by the last successful pull.
    pub fn heap_tid(&self) -> Option<ItemPointer> {
        self.heap_tid
    }

    /// Distance of the element behind the last returned row, as computed by
    /// the index's distance function.
    pub fn current_distance(&self) -> Option<f64> {
        self.distance
    }

    /// Rows come back in exact order for the index's operator.
    pub fn recheck_order_by(&self) -> bool {
        false
    }

    pub fn phase(&self) -> ScanPhase {
        self.state.phase()
    }

    /// Counters from the search that primed this scan.
    pub fn search_stats(&self) -> Option<&SearchStats> {
        self.state.last_stats()
    }

    pub fn collation(&self) -> Collation {
        self.state.collation()
    }

    pub fn ef_search(&self) -> usize {
        self.state.ef_search()
    }

    pub fn key_data(&self) -> &[ScanKey] {
        &self.key_data
    }

    pub fn order_by_data(&self) -> &[ScanKey] {
        &self.order_by_data
    }

    /// Block of the index page currently pinned by this scan.
    pub fn pinned_block(&self) -> Option<crate::page::BlockNumber> {
        self.state.pinned_block()
    }

    /// Close the scan, releasing its pin and pending results.
    pub fn end(mut self) {
        self.state.release();
        tracing::trace!("HNSW scan ended");
    }

    fn opclass_name(&self) -> &'static str {
        self.relation.opclass().map_or("custom", |opclass| opclass.name())
    }
}

impl<G: GraphStore, P: BufferPool + ?Sized> Iterator for HnswScan<'_, G, P> {
    type Item = Result<ItemPointer>;

    /// Forward pulls as an iterator. Stops after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.state.phase() == ScanPhase::Exhausted {
            return None;
        }
        match self.get_next_tuple(ScanDirection::Forward) {
            Ok(true) => self.heap_tid.map(Ok),
            Ok(false) => None,
            Err(err) => {
                self.state.exhaust();
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PinTracker;
    use crate::hnsw::graph::{HnswConfig, HnswGraph};
    use crate::relation::OperatorClass;

    fn tid(n: u16) -> ItemPointer {
        ItemPointer::new(0, n)
    }

    /// Four collinear points, fully connected at layer 0.
    fn small_relation(opclass: OperatorClass) -> IndexRelation<HnswGraph> {
        let mut g = HnswGraph::new(2, HnswConfig::default());
        for (i, v) in [[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]].iter().enumerate() {
            g.push_node(v, 0, vec![tid(i as u16 + 1)]);
        }
        for a in 0..4 {
            for b in a + 1..4 {
                g.connect(a, b, 0);
            }
        }
        IndexRelation::new(g, opclass)
    }

    fn collect(scan: &mut HnswScan<'_, HnswGraph, PinTracker>) -> Vec<ItemPointer> {
        let mut out = Vec::new();
        while scan.get_next_tuple(ScanDirection::Forward).unwrap() {
            out.push(scan.heap_tid().unwrap());
        }
        out
    }

    #[test]
    fn test_rows_come_back_nearest_first() {
        let rel = small_relation(OperatorClass::L2);
        let pool = PinTracker::new();
        let mut scan = HnswScan::begin(&rel, &pool, 0, 1, ScanOptions::default());
        scan.rescan(&[], &[ScanKey::vector(vec![3.1, 0.0])]);
        assert_eq!(collect(&mut scan), vec![tid(3), tid(4), tid(2), tid(1)]);
        assert!(!scan.recheck_order_by());
        assert_eq!(scan.phase(), ScanPhase::Exhausted);
        scan.end();
        assert_eq!(pool.pin_count(), 0);
    }

    #[test]
    fn test_no_search_before_first_pull() {
        let rel = small_relation(OperatorClass::L2);
        let pool = PinTracker::new();
        let mut scan = HnswScan::begin(&rel, &pool, 0, 1, ScanOptions::default());
        scan.rescan(&[], &[ScanKey::vector(vec![0.0, 0.0])]);
        assert_eq!(scan.phase(), ScanPhase::Fresh);
        assert!(scan.search_stats().is_none());
        assert_eq!(pool.total_acquired(), 0);
    }

    #[test]
    fn test_backward_is_rejected() {
        let rel = small_relation(OperatorClass::L2);
        let pool = PinTracker::new();
        let mut scan = HnswScan::begin(&rel, &pool, 0, 1, ScanOptions::default());
        assert_eq!(
            scan.get_next_tuple(ScanDirection::Backward),
            Err(ScanError::UnsupportedDirection(ScanDirection::Backward))
        );
    }

    #[test]
    fn test_rescan_copies_declared_keys_only() {
        let rel = small_relation(OperatorClass::L2);
        let pool = PinTracker::new();
        let mut scan = HnswScan::begin(&rel, &pool, 1, 1, ScanOptions::default());
        scan.rescan(
            &[ScanKey::vector(vec![9.0]), ScanKey::vector(vec![8.0])],
            &[ScanKey::vector(vec![1.0, 0.0]), ScanKey::vector(vec![2.0, 0.0])],
        );
        assert_eq!(scan.key_data(), &[ScanKey::vector(vec![9.0])]);
        assert_eq!(scan.order_by_data(), &[ScanKey::vector(vec![1.0, 0.0])]);
    }

    #[test]
    fn test_iterator_yields_rows() {
        let rel = small_relation(OperatorClass::L1);
        let pool = PinTracker::new();
        let mut scan = HnswScan::begin(&rel, &pool, 0, 1, ScanOptions::default());
        scan.rescan(&[], &[ScanKey::vector(vec![0.0, 0.0])]);
        let rows: Vec<ItemPointer> = scan.by_ref().take(2).map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![tid(1), tid(2)]);
        assert_eq!(scan.current_distance(), Some(2.0));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let rel = small_relation(OperatorClass::L2);
        let pool = PinTracker::new();
        let mut scan = HnswScan::begin(&rel, &pool, 0, 0, ScanOptions::default());
        assert_eq!(scan.next(), Some(Err(ScanError::MissingOrderBy)));
        assert_eq!(scan.next(), None);
    }
}
