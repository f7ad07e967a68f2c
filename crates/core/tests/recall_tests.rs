//! End-to-end recall against brute-force ordering.
//!
//! 10,000 random 10-d vectors, 20 random queries, LIMIT 20, for every
//! operator class, over a graph built with the default memory budget and
//! one that runs out of memory early in the build.

use hnswscan_core::buffer::PinTracker;
use hnswscan_core::hnsw::{GraphBuilder, HnswConfig, HnswGraph, InsertOutcome};
use hnswscan_core::page::ItemPointer;
use hnswscan_core::recall::{exact_top_k, random_vectors, recall};
use hnswscan_core::{HnswScan, IndexRelation, OperatorClass, ScanDirection, ScanKey, ScanOptions};

const ROWS: usize = 10_000;
const DIM: usize = 10;
const QUERIES: usize = 20;
const LIMIT: usize = 20;
const MIN_RECALL: f64 = 0.98;
const CONSTRAINED_BUDGET: usize = 64 * 1024;

fn row_tid(row: usize) -> ItemPointer {
    ItemPointer::from_row(row, 100)
}

fn tid_row(tid: ItemPointer) -> usize {
    tid.block as usize * 100 + tid.offset as usize - 1
}

fn build(
    opclass: OperatorClass,
    vectors: &[Vec<f32>],
    budget: Option<usize>,
) -> (IndexRelation<HnswGraph>, bool) {
    let mut builder = GraphBuilder::new(DIM, HnswConfig::default(), opclass).unwrap();
    if let Some(bytes) = budget {
        builder = builder.with_memory_budget(bytes);
    }
    for (i, v) in vectors.iter().enumerate() {
        let outcome = builder.insert(row_tid(i), v).unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(_)));
    }
    let cached = builder.caches_distances();
    (IndexRelation::new(builder.finish(), opclass), cached)
}

fn measure(opclass: OperatorClass, budget: Option<usize>) -> f64 {
    let vectors = random_vectors(ROWS, DIM, 0x1234);
    let queries = random_vectors(QUERIES, DIM, 0x5678);
    let (rel, cached) = build(opclass, &vectors, budget);
    assert_eq!(cached, budget.is_none(), "{opclass}: unexpected build mode");

    let pool = PinTracker::new();
    let options = ScanOptions::new(100).unwrap();
    let mut found = Vec::new();
    let mut truth = Vec::new();

    for (qi, q) in queries.iter().enumerate() {
        let mut scan = HnswScan::begin(&rel, &pool, 0, 1, options);
        scan.rescan(&[], &[ScanKey::vector(q.clone())]);
        let mut rows = Vec::with_capacity(LIMIT);
        while rows.len() < LIMIT && scan.get_next_tuple(ScanDirection::Forward).unwrap() {
            rows.push(tid_row(scan.heap_tid().unwrap()));
        }
        scan.end();
        assert_eq!(rows.len(), LIMIT, "{opclass}: short result for query {qi}");

        found.extend(rows.into_iter().map(|r| (qi, r)));
        truth.extend(
            exact_top_k(&vectors, q, LIMIT, opclass.metric())
                .into_iter()
                .map(|r| (qi, r)),
        );
    }
    assert_eq!(pool.pin_count(), 0);
    recall(&found, &truth)
}

fn check(opclass: OperatorClass, budget: Option<usize>) {
    let r = measure(opclass, budget);
    assert!(r >= MIN_RECALL, "{opclass} (budget {budget:?}): recall {r:.4} below {MIN_RECALL}");
}

#[test]
fn test_recall_l2() {
    check(OperatorClass::L2, None);
}

#[test]
fn test_recall_inner_product() {
    check(OperatorClass::InnerProduct, None);
}

#[test]
fn test_recall_cosine() {
    check(OperatorClass::Cosine, None);
}

#[test]
fn test_recall_l1() {
    check(OperatorClass::L1, None);
}

#[test]
fn test_recall_l2_constrained_memory() {
    check(OperatorClass::L2, Some(CONSTRAINED_BUDGET));
}

#[test]
fn test_recall_inner_product_constrained_memory() {
    check(OperatorClass::InnerProduct, Some(CONSTRAINED_BUDGET));
}

#[test]
fn test_recall_cosine_constrained_memory() {
    check(OperatorClass::Cosine, Some(CONSTRAINED_BUDGET));
}

#[test]
fn test_recall_l1_constrained_memory() {
    check(OperatorClass::L1, Some(CONSTRAINED_BUDGET));
}
