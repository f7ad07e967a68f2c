//! Row identifiers and element page placement.
//!
//! An element and its neighbor tuple are packed onto 8 KiB index pages in
//! insertion order, starting right after the meta page. Only the resulting
//! block numbers matter at query time: they tell the scan which page to pin
//! for each returned row.

use crate::config;
use serde::{Deserialize, Serialize};

/// Index or heap block number.
pub type BlockNumber = u32;

/// Line pointer offset within a heap page (1-based).
pub type OffsetNumber = u16;

/// Heap row identifier returned by the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemPointer {
    pub block: BlockNumber,
    pub offset: OffsetNumber,
}

impl ItemPointer {
    pub fn new(block: BlockNumber, offset: OffsetNumber) -> Self {
        Self { block, offset }
    }

    /// Builds a tid from a dense row number, with `per_page` rows per heap page.
    pub fn from_row(row: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        Self {
            block: (row / per_page) as BlockNumber,
            offset: (row % per_page + 1) as OffsetNumber,
        }
    }
}

#[inline]
fn maxalign(len: usize) -> usize {
    (len + config::MAXALIGN - 1) & !(config::MAXALIGN - 1)
}

/// On-page size of an element tuple holding a `dimension`-wide vector.
pub fn element_tuple_size(dimension: usize) -> usize {
    maxalign(config::ELEMENT_TUPLE_HEADER_BYTES + config::VECTOR_HEADER_BYTES + dimension * 4)
}

/// On-page size of the neighbor tuple of an element at `level`.
///
/// Layer 0 reserves `2 * m` slots and every upper layer `m`.
pub fn neighbor_tuple_size(level: usize, m: usize) -> usize {
    maxalign(config::NEIGHBOR_TUPLE_HEADER_BYTES + (level + 2) * m * config::NEIGHBOR_ITEM_BYTES)
}

/// Hands out block numbers by filling pages front to back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAllocator {
    current: BlockNumber,
    free: usize,
}

impl PageAllocator {
    const USABLE: usize = config::BLCKSZ - config::PAGE_OVERHEAD_BYTES;

    pub fn new() -> Self {
        Self {
            current: config::HNSW_METAPAGE_BLKNO + 1,
            free: Self::USABLE,
        }
    }

    /// Reserves room for an element plus its neighbor tuple and returns its block.
    /// An element larger than a page gets a fresh page to itself.
    pub fn allocate(&mut self, dimension: usize, level: usize, m: usize) -> BlockNumber {
        let needed = element_tuple_size(dimension)
            + neighbor_tuple_size(level, m)
            + 2 * config::ITEM_ID_BYTES;
        if needed > self.free && self.free < Self::USABLE {
            self.current += 1;
            self.free = Self::USABLE;
        }
        self.free = self.free.saturating_sub(needed);
        self.current
    }

    /// Number of element pages used so far.
    pub fn pages(&self) -> usize {
        (self.current - config::HNSW_METAPAGE_BLKNO) as usize
    }
}

impl Default for PageAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_element_lands_after_meta_page() {
        let mut pages = PageAllocator::new();
        assert_eq!(pages.allocate(3, 0, 16), 1);
    }

    #[test]
    fn test_pages_fill_before_advancing() {
        let mut pages = PageAllocator::new();
        let per_element = element_tuple_size(10) + neighbor_tuple_size(0, 16) + 8;
        let fit = (config::BLCKSZ - config::PAGE_OVERHEAD_BYTES) / per_element;
        for _ in 0..fit {
            assert_eq!(pages.allocate(10, 0, 16), 1);
        }
        assert_eq!(pages.allocate(10, 0, 16), 2);
        assert_eq!(pages.pages(), 2);
    }

    #[test]
    fn test_oversized_element_gets_own_page() {
        let mut pages = PageAllocator::new();
        assert_eq!(pages.allocate(1, 0, 2), 1);
        assert_eq!(pages.allocate(4000, 0, 16), 2);
        assert_eq!(pages.allocate(1, 0, 2), 3);
    }

    #[test]
    fn test_item_pointer_from_row() {
        assert_eq!(ItemPointer::from_row(0, 100), ItemPointer::new(0, 1));
        assert_eq!(ItemPointer::from_row(99, 100), ItemPointer::new(0, 100));
        assert_eq!(ItemPointer::from_row(100, 100), ItemPointer::new(1, 1));
    }
}
