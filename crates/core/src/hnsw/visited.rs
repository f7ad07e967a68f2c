//! Generation-based visited set for layer searches.
//!
//! Node ids are dense arena indexes, so membership is an array lookup. Each
//! `clear()` bumps a generation counter instead of zeroing the array, which
//! keeps the per-layer reset of a multi-layer search O(1).

use super::graph::NodeId;

/// Visited set keyed by [`NodeId`]. Also counts the nodes marked since the last clear,
/// which is how a search reports how much of the graph it touched.
#[derive(Debug)]
pub struct VisitedSet {
    data: Vec<u16>,
    generation: u16,
    marked: usize,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u16; capacity],
            generation: 1,
            marked: 0,
        }
    }

    /// Reset the set. Full memset only when the generation wraps.
    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.data.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
        self.marked = 0;
    }

    /// Grow to cover at least `cap` node ids.
    pub fn ensure_capacity(&mut self, cap: usize) {
        if cap > self.data.len() {
            self.data.resize(cap, 0);
        }
    }

    /// Mark `id` as visited. Returns `true` if it was not visited before.
    #[inline]
    pub fn insert(&mut self, id: NodeId) -> bool {
        let idx = id as usize;
        if idx >= self.data.len() {
            self.data.resize(idx + 1, 0);
        }
        if self.data[idx] == self.generation {
            false
        } else {
            self.data[idx] = self.generation;
            self.marked += 1;
            true
        }
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.data.get(id as usize) == Some(&self.generation)
    }

    /// Number of distinct nodes marked since the last clear.
    pub fn len(&self) -> usize {
        self.marked
    }

    pub fn is_empty(&self) -> bool {
        self.marked == 0
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_clear() {
        let mut vs = VisitedSet::new(100);
        assert!(vs.insert(0));
        assert!(!vs.insert(0));
        assert!(vs.insert(50));
        assert_eq!(vs.len(), 2);

        vs.clear();
        assert!(vs.is_empty());
        assert!(!vs.contains(0));
        assert!(vs.insert(0));
        assert!(vs.insert(50));
    }

    #[test]
    fn test_grows_past_capacity() {
        let mut vs = VisitedSet::new(2);
        assert!(vs.insert(10));
        assert!(vs.contains(10));
        assert!(!vs.contains(11));
    }

    #[test]
    fn test_generation_overflow() {
        let mut vs = VisitedSet::new(10);
        for _ in 0..65534 {
            vs.clear();
        }
        assert_eq!(vs.generation, u16::MAX);
        vs.insert(5);

        // Wrapping clears the array and restarts at 1
        vs.clear();
        assert_eq!(vs.generation, 1);
        assert!(vs.insert(5));
    }
}
