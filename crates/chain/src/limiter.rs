//! # Request Limiter
//!
//! Membatasi jumlah RPC read yang berjalan bersamaan ke full node publik.
//!
//! ## Semantik
//!
//! - Paling banyak `capacity` operasi berjalan bersamaan
//! - Caller berikutnya antre sesuai urutan datang (FIFO, semaphore fair)
//! - Tidak ada prioritas dan tidak ada cancellation
//! - Error satu operasi hanya kembali ke caller-nya sendiri
//!
//! Antrean tidak punya timeout; beban berkelanjutan di atas kapasitas
//! membuat antrean tumbuh tanpa batas.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::metrics::ChainMetrics;

/// Default concurrent RPC reads.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Bounded-concurrency gate for outbound reads.
#[derive(Debug)]
pub struct RequestLimiter {
    semaphore: Semaphore,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    metrics: Option<Arc<ChainMetrics>>,
}

impl Default for RequestLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestLimiter {
    /// Membuat limiter dengan kapasitas tertentu (minimal 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            metrics: None,
        }
    }

    /// Report peak concurrency into shared metrics.
    pub fn with_metrics(mut self, metrics: Arc<ChainMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Operations currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest concurrency observed since creation.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Run `fut` once a slot is free. The slot is released when `fut`
    /// completes, whatever its output.
    pub async fn run<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquire only fails in theory.
        let _permit = self.semaphore.acquire().await.ok();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard { in_flight: &self.in_flight };
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(m) = &self.metrics {
            m.limiter_peak_in_flight.set_max(now as u64);
        }
        debug!(in_flight = now, capacity = self.capacity, "limiter slot acquired");

        fut.await
    }
}
