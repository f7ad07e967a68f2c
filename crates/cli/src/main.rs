use clap::Parser;
use hnswscan_core::buffer::PinTracker;
use hnswscan_core::config;
use hnswscan_core::hnsw::{GraphBuilder, HnswConfig, InsertOutcome};
use hnswscan_core::page::ItemPointer;
use hnswscan_core::recall::{exact_top_k, random_vectors, recall};
use hnswscan_core::{HnswScan, IndexRelation, OperatorClass, ScanDirection, ScanKey, ScanOptions};
use serde::Serialize;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Rows per synthetic heap page.
const ROWS_PER_PAGE: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "hnswscan", about = "Measure HNSW index scan recall on synthetic data")]
struct Args {
    /// Number of indexed vectors
    #[arg(long, default_value_t = 10_000)]
    count: usize,

    /// Vector dimension
    #[arg(long, default_value_t = 10)]
    dim: usize,

    /// Number of random queries
    #[arg(long, default_value_t = 20)]
    queries: usize,

    /// Rows fetched per query (the LIMIT)
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Beam width at layer 0
    #[arg(long, env = "HNSW_EF_SEARCH", default_value_t = config::HNSW_DEFAULT_EF_SEARCH)]
    ef_search: usize,

    /// Operator class: l2, ip, cosine or l1
    #[arg(long, default_value = "l2")]
    operator: OperatorClass,

    /// Max connections per layer (2*m at layer 0)
    #[arg(long, default_value_t = config::HNSW_DEFAULT_M)]
    m: usize,

    /// Candidate list size during build
    #[arg(long, default_value_t = config::HNSW_DEFAULT_EF_CONSTRUCTION)]
    ef_construction: usize,

    /// Build memory budget in KiB (omit for the default)
    #[arg(long)]
    memory_budget_kb: Option<usize>,

    /// Seed for the dataset and level assignment
    #[arg(long, default_value_t = config::HNSW_DEFAULT_SEED)]
    seed: u64,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[derive(Serialize)]
struct BuildReport {
    rows: usize,
    elements: usize,
    skipped: usize,
    pages: usize,
    max_level: usize,
    caches_distances: bool,
    seconds: f64,
}

#[derive(Serialize)]
struct ScanReport {
    queries: usize,
    limit: usize,
    ef_search: usize,
    recall: f64,
    qps: f64,
    avg_latency_us: f64,
    avg_distance_computations: f64,
    pins_acquired: u64,
    pins_held_after: usize,
}

#[derive(Serialize)]
struct Report {
    operator: OperatorClass,
    dimension: usize,
    config: HnswConfig,
    build: BuildReport,
    scan: ScanReport,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env()
        .add_directive("hnswscan_cli=info".parse().expect("valid directive literal"))
        .add_directive("hnswscan_core=info".parse().expect("valid directive literal"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let options = ScanOptions::new(args.ef_search)?;
    let hnsw_config = HnswConfig {
        m: args.m,
        ef_construction: args.ef_construction,
    };

    let vectors = random_vectors(args.count, args.dim, args.seed);
    let queries = random_vectors(args.queries, args.dim, args.seed.wrapping_add(1));

    tracing::info!(
        rows = args.count,
        dim = args.dim,
        operator = %args.operator,
        m = hnsw_config.m,
        ef_construction = hnsw_config.ef_construction,
        "Building index"
    );

    let mut builder = GraphBuilder::new(args.dim, hnsw_config, args.operator)?.with_seed(args.seed);
    if let Some(kb) = args.memory_budget_kb {
        builder = builder.with_memory_budget(kb * 1024);
    }
    let t0 = Instant::now();
    let mut skipped = 0;
    for (i, v) in vectors.iter().enumerate() {
        if builder.insert(ItemPointer::from_row(i, ROWS_PER_PAGE), v)? == InsertOutcome::Skipped {
            skipped += 1;
        }
    }
    let caches_distances = builder.caches_distances();
    let graph = builder.finish();
    let build = BuildReport {
        rows: args.count,
        elements: graph.len(),
        skipped,
        pages: graph.page_count(),
        max_level: graph.max_level,
        caches_distances,
        seconds: t0.elapsed().as_secs_f64(),
    };
    tracing::info!(elements = build.elements, seconds = build.seconds, "Index built");

    let relation = IndexRelation::new(graph, args.operator);
    let pool = PinTracker::new();
    let mut found = Vec::new();
    let mut truth = Vec::new();
    let mut distance_computations = 0usize;

    let t0 = Instant::now();
    for (qi, q) in queries.iter().enumerate() {
        let mut scan = HnswScan::begin(&relation, &pool, 0, 1, options);
        scan.rescan(&[], &[ScanKey::vector(q.clone())]);
        let mut fetched = 0;
        while fetched < args.limit && scan.get_next_tuple(ScanDirection::Forward)? {
            if let Some(tid) = scan.heap_tid() {
                found.push((qi, tid));
            }
            fetched += 1;
        }
        if let Some(stats) = scan.search_stats() {
            distance_computations += stats.distance_computations();
        }
        scan.end();
    }
    let elapsed = t0.elapsed();

    for (qi, q) in queries.iter().enumerate() {
        truth.extend(
            exact_top_k(&vectors, q, args.limit, args.operator.metric())
                .into_iter()
                .map(|row| (qi, ItemPointer::from_row(row, ROWS_PER_PAGE))),
        );
    }

    let nq = args.queries.max(1) as f64;
    let report = Report {
        operator: args.operator,
        dimension: args.dim,
        config: hnsw_config,
        build,
        scan: ScanReport {
            queries: args.queries,
            limit: args.limit,
            ef_search: options.ef_search,
            recall: recall(&found, &truth),
            qps: args.queries as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
            avg_latency_us: elapsed.as_micros() as f64 / nq,
            avg_distance_computations: distance_computations as f64 / nq,
            pins_acquired: pool.total_acquired(),
            pins_held_after: pool.pin_count(),
        },
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
