//! Scan statistics, recorded through the `metrics` facade.
//!
//! Without an installed recorder these are no-ops.

use metrics::counter;

/// Counts one index scan. Recorded each time a scan is primed.
pub fn record_index_scan(opclass: &'static str) {
    counter!("hnsw_index_scans_total", "opclass" => opclass).increment(1);
}

/// Counts one heap row identifier handed back to the executor.
pub fn record_heap_tid_returned(opclass: &'static str) {
    counter!("hnsw_heap_tids_returned_total", "opclass" => opclass).increment(1);
}
