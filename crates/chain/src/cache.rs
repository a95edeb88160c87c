//! # Response Cache with TTL
//!
//! Cache in-memory untuk response RPC yang sukses.
//!
//! ## Prinsip
//!
//! - Cache hanya untuk performa, BUKAN sumber kebenaran
//! - Entry fresh jika umur < TTL dan belum di-invalidate
//! - Producer gagal + entry lama ada → entry lama dikembalikan (stale)
//! - Producer gagal + tidak ada entry → error diteruskan
//! - Tidak ada eviction selain staleness; kehilangan cache hanya
//!   menurunkan performa
//!
//! Lock tidak pernah ditahan melewati `.await`: cek dilakukan di bawah
//! lock, producer berjalan tanpa lock, lalu hasil disimpan di bawah lock
//! lagi. Dua miss bersamaan untuk key yang sama bisa memanggil producer
//! dua kali; yang selesai terakhir menang.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::freshness::CacheDomain;
use crate::metrics::ChainMetrics;

/// Cache key: domain plus logical endpoint name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub domain: CacheDomain,
    pub name: String,
}

impl CacheKey {
    pub fn new(domain: CacheDomain, name: impl Into<String>) -> Self {
        Self { domain, name: name.into() }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.name)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    invalidated: bool,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.invalidated && self.stored_at.elapsed() < ttl
    }
}

/// How a value was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Fresh entry; producer not called.
    Hit(V),
    /// Producer succeeded; entry replaced.
    Fetched(V),
    /// Producer failed; last known value returned.
    Stale(V),
}

impl<V> Lookup<V> {
    pub fn into_value(self) -> V {
        match self {
            Lookup::Hit(v) | Lookup::Fetched(v) | Lookup::Stale(v) => v,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Lookup::Stale(_))
    }
}

/// TTL cache keyed by [`CacheKey`].
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    metrics: Option<Arc<ChainMetrics>>,
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Membuat cache kosong.
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()), metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<ChainMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Return the cached value if fresh, else run `producer`.
    ///
    /// See the module docs for the failure policy.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        producer: F,
    ) -> Result<Lookup<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        if let Some(value) = self.get(key, ttl) {
            if let Some(m) = &self.metrics {
                m.cache_hits.inc();
            }
            debug!(key = %key, "cache hit");
            return Ok(Lookup::Hit(value));
        }

        if let Some(m) = &self.metrics {
            m.cache_misses.inc();
        }

        match producer().await {
            Ok(value) => {
                self.insert(key.clone(), value.clone());
                Ok(Lookup::Fetched(value))
            }
            Err(e) => match self.get_stale(key) {
                Some(value) => {
                    if let Some(m) = &self.metrics {
                        m.cache_stale_served.inc();
                    }
                    warn!(key = %key, error = %e, "producer failed, serving stale entry");
                    Ok(Lookup::Stale(value))
                }
                None => Err(e),
            },
        }
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &CacheKey, ttl: Duration) -> Option<V> {
        self.entries
            .read()
            .get(key)
            .filter(|e| e.is_fresh(ttl))
            .map(|e| e.value.clone())
    }

    /// Last stored value regardless of age or invalidation.
    pub fn get_stale(&self, key: &CacheKey) -> Option<V> {
        self.entries.read().get(key).map(|e| e.value.clone())
    }

    /// Store `value` stamped with the current time.
    pub fn insert(&self, key: CacheKey, value: V) {
        self.entries.write().insert(
            key,
            CacheEntry { value, stored_at: Instant::now(), invalidated: false },
        );
    }

    /// Mark one entry stale. It stays available as a failure fallback.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(entry) = self.entries.write().get_mut(key) {
            entry.invalidated = true;
        }
    }

    /// Mark every entry of a domain stale.
    pub fn invalidate_domain(&self, domain: CacheDomain) {
        for (key, entry) in self.entries.write().iter_mut() {
            if key.domain == domain {
                entry.invalidated = true;
            }
        }
    }

    pub fn invalidate_all(&self) {
        for entry in self.entries.write().values_mut() {
            entry.invalidated = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
