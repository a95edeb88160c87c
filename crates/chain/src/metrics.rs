//! # Chain Read Metrics
//!
//! Counter atomik untuk read path ke full node.
//!
//! ## Metrics
//!
//! - `suigives_chain_rpc_calls_total`: RPC attempt ke full node
//! - `suigives_chain_retries_total`: retry per failure class
//! - `suigives_cache_hits_total` / `suigives_cache_misses_total`
//! - `suigives_cache_stale_served_total`: stale data dipakai saat producer gagal
//! - `suigives_persisted_fallbacks_total`: fallback ke persisted cache
//! - `suigives_degraded_reads_total`: read yang berakhir `None`
//! - `suigives_limiter_peak_in_flight`: puncak request bersamaan

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counter menggunakan atomic operations.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Membuat counter baru dengan nilai 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

/// Thread-safe gauge untuk nilai yang bisa naik turun.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn set(&self, v: u64) {
        self.value.store(v, Ordering::SeqCst);
    }

    /// Raise the gauge to `v` if it is higher than the current value.
    pub fn set_max(&self, v: u64) {
        self.value.fetch_max(v, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

/// Counters shared by the limiter, cache, retry and pipeline.
#[derive(Debug, Default)]
pub struct ChainMetrics {
    pub rpc_calls: Counter,
    pub network_retries: Counter,
    pub rate_limit_retries: Counter,
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub cache_stale_served: Counter,
    pub persisted_fallbacks: Counter,
    pub degraded_reads: Counter,
    pub limiter_peak_in_flight: Gauge,
}

impl ChainMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export dalam Prometheus exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(1024);

        let counters = [
            ("suigives_chain_rpc_calls_total", "RPC attempts sent to the full node", &self.rpc_calls),
            ("suigives_cache_hits_total", "Reads served from a fresh cache entry", &self.cache_hits),
            ("suigives_cache_misses_total", "Reads that invoked the producer", &self.cache_misses),
            ("suigives_cache_stale_served_total", "Stale entries served after producer failure", &self.cache_stale_served),
            ("suigives_persisted_fallbacks_total", "Reads served from the persisted fallback cache", &self.persisted_fallbacks),
            ("suigives_degraded_reads_total", "Reads that degraded to an empty result", &self.degraded_reads),
        ];
        for (name, help, counter) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, counter.get());
            let _ = writeln!(output);
        }

        let _ = writeln!(output, "# HELP suigives_chain_retries_total Retries by failure class");
        let _ = writeln!(output, "# TYPE suigives_chain_retries_total counter");
        let _ = writeln!(output, "suigives_chain_retries_total{{class=\"network\"}} {}", self.network_retries.get());
        let _ = writeln!(output, "suigives_chain_retries_total{{class=\"rate_limited\"}} {}", self.rate_limit_retries.get());
        let _ = writeln!(output);

        let _ = writeln!(output, "# HELP suigives_limiter_peak_in_flight Peak concurrent RPC reads");
        let _ = writeln!(output, "# TYPE suigives_limiter_peak_in_flight gauge");
        let _ = writeln!(output, "suigives_limiter_peak_in_flight {}", self.limiter_peak_in_flight.get());

        output
    }
}
