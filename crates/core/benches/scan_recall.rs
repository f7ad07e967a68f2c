//! Scan benchmark: synthetic uniform vectors
//! Measures Recall@10 and QPS of full index scans against brute-force ordering
//!
//! Usage: cargo bench --bench scan_recall

use hnswscan_core::buffer::PinTracker;
use hnswscan_core::hnsw::{build_graph, HnswConfig};
use hnswscan_core::page::ItemPointer;
use hnswscan_core::recall::{exact_top_k, random_vectors, recall};
use hnswscan_core::{HnswScan, IndexRelation, OperatorClass, ScanDirection, ScanKey, ScanOptions};
use std::time::Instant;

const ROWS: usize = 50_000;
const DIM: usize = 32;
const QUERIES: usize = 500;
const K: usize = 10;

fn main() {
    println!("=== Scan Benchmark: {ROWS} uniform vectors x {DIM}d ===");
    println!();

    let vectors = random_vectors(ROWS, DIM, 42);
    let queries = random_vectors(QUERIES, DIM, 43);

    for opclass in [OperatorClass::L2, OperatorClass::Cosine] {
        println!("--- {opclass} ---");

        let config = HnswConfig::default();
        println!("Config: M={}, ef_c={}", config.m, config.ef_construction);

        let t0 = Instant::now();
        let graph = build_graph(
            DIM,
            config,
            opclass,
            None,
            vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (ItemPointer::from_row(i, 100), v.as_slice())),
        )
        .unwrap_or_else(|e| panic!("build failed: {e}"));
        let build_time = t0.elapsed();
        println!(
            "  Build time: {:.2}s ({:.0} inserts/s), {} pages",
            build_time.as_secs_f64(),
            ROWS as f64 / build_time.as_secs_f64(),
            graph.page_count()
        );

        let truth: Vec<Vec<ItemPointer>> = queries
            .iter()
            .map(|q| {
                exact_top_k(&vectors, q, K, opclass.metric())
                    .into_iter()
                    .map(|i| ItemPointer::from_row(i, 100))
                    .collect()
            })
            .collect();

        let rel = IndexRelation::new(graph, opclass);
        let pool = PinTracker::new();

        println!();
        println!("  ef_search | Recall@10 |    QPS    | Avg latency | Pins/query");
        println!("  ----------+-----------+-----------+-------------+-----------");

        for ef in [10, 20, 40, 80, 120, 200, 400] {
            let options = ScanOptions::new(ef).unwrap_or_default();
            let pins_before = pool.total_acquired();

            let t0 = Instant::now();
            let mut total_recall = 0.0f64;
            for (q, gt) in queries.iter().zip(&truth) {
                let mut scan = HnswScan::begin(&rel, &pool, 0, 1, options);
                scan.rescan(&[], &[ScanKey::vector(q.clone())]);
                let mut found = Vec::with_capacity(K);
                while found.len() < K {
                    match scan.get_next_tuple(ScanDirection::Forward) {
                        Ok(true) => found.extend(scan.heap_tid()),
                        _ => break,
                    }
                }
                scan.end();
                total_recall += recall(&found, gt);
            }
            let elapsed = t0.elapsed();

            let avg_recall = total_recall / QUERIES as f64;
            let qps = QUERIES as f64 / elapsed.as_secs_f64();
            let avg_latency_us = elapsed.as_micros() as f64 / QUERIES as f64;
            let pins = (pool.total_acquired() - pins_before) as f64 / QUERIES as f64;

            println!(
                "  {:>9} | {:.4}    | {:>9.1} | {:>8.0} us | {:>9.1}",
                ef, avg_recall, qps, avg_latency_us, pins
            );
        }
        println!();
    }

    println!("=== Benchmark complete ===");
}
