//! # Chain Read Pipeline
//!
//! Satu-satunya jalur read ke full node:
//!
//! ```text
//! cache ──miss──► limiter ──► retry ──► rpc
//!   │                                    │
//!   │◄────────── success (store, persist)┘
//!   │
//!   └─ exhausted ─► stale entry ─► persisted file ─► Ok(None)
//! ```
//!
//! - Limiter membungkus setiap attempt, bukan seluruh loop retry, sehingga
//!   caller lain bisa jalan selama backoff
//! - Error `Network`/`RateLimited` tidak pernah sampai ke caller; read
//!   terdegradasi menjadi data lama atau `None`
//! - Error fatal (`Rpc`, `Decode`) diteruskan apa adanya
//! - I/O file persisted jalan di `spawn_blocking`, bukan di worker async

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use suigives_common::AppConfig;
use tracing::{debug, warn};

use crate::cache::{CacheKey, Lookup, ResponseCache};
use crate::error::ChainError;
use crate::freshness::{CacheDomain, FreshnessPolicy};
use crate::limiter::RequestLimiter;
use crate::metrics::ChainMetrics;
use crate::persisted::PersistedCache;
use crate::retry::RetryPolicy;

#[derive(Debug)]
pub struct ReadPipeline {
    cache: ResponseCache<Value>,
    limiter: RequestLimiter,
    retry: RetryPolicy,
    freshness: FreshnessPolicy,
    persisted: Option<PersistedCache>,
    metrics: Arc<ChainMetrics>,
}

impl ReadPipeline {
    pub fn new(
        retry: RetryPolicy,
        limiter: RequestLimiter,
        freshness: FreshnessPolicy,
        metrics: Arc<ChainMetrics>,
    ) -> Self {
        Self {
            cache: ResponseCache::new().with_metrics(metrics.clone()),
            limiter: limiter.with_metrics(metrics.clone()),
            retry,
            freshness,
            persisted: None,
            metrics,
        }
    }

    pub fn from_config(cfg: &AppConfig, metrics: Arc<ChainMetrics>) -> Self {
        let pipeline = Self::new(
            RetryPolicy::from_config(&cfg.chain),
            RequestLimiter::new(cfg.chain.max_concurrent_requests),
            FreshnessPolicy::from_config(&cfg.cache),
            metrics,
        );
        match &cfg.chain.persisted_cache_dir {
            Some(dir) => pipeline.with_persisted(PersistedCache::new(
                dir,
                std::time::Duration::from_secs(cfg.chain.persisted_cache_max_age_secs),
            )),
            None => pipeline,
        }
    }

    pub fn with_persisted(mut self, persisted: PersistedCache) -> Self {
        self.persisted = Some(persisted);
        self
    }

    pub fn metrics(&self) -> &Arc<ChainMetrics> {
        &self.metrics
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    pub fn freshness(&self) -> &FreshnessPolicy {
        &self.freshness
    }

    /// Cached read. `Ok(None)` means every source failed with a degradable
    /// error and nothing was cached.
    pub async fn fetch<T, F, Fut>(&self, key: &CacheKey, op: F) -> Result<Option<T>, ChainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let ttl = self.freshness.ttl(key.domain);
        let lookup = self
            .cache
            .get_or_fetch(key, ttl, || self.fetch_remote(op))
            .await;

        match lookup {
            Ok(Lookup::Fetched(value)) => {
                self.record_success(key, &value).await;
                decode(value).map(Some)
            }
            Ok(Lookup::Hit(value)) | Ok(Lookup::Stale(value)) => decode(value).map(Some),
            Err(e) if e.is_degradable() => Ok(self.fallback(key, &e).await),
            Err(e) => Err(e),
        }
    }

    /// Uncached authoritative read. Refreshes the cache on success and
    /// returns every failure to the caller.
    pub async fn fetch_authoritative<T, F, Fut>(&self, key: &CacheKey, op: F) -> Result<T, ChainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let value = self.fetch_remote(op).await?;
        self.cache.insert(key.clone(), value.clone());
        self.record_success(key, &value).await;
        decode(value)
    }

    /// Invalidate one domain in both the cache and the freshness policy.
    pub fn invalidate(&self, domain: CacheDomain) {
        self.cache.invalidate_domain(domain);
        self.freshness.invalidate(domain);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.freshness.invalidate_all();
    }

    async fn fetch_remote<T, F, Fut>(&self, mut op: F) -> Result<Value, ChainError>
    where
        T: Serialize,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let value = self
            .retry
            .run(Some(&self.metrics), || {
                self.metrics.rpc_calls.inc();
                self.limiter.run(op())
            })
            .await?;
        Ok(serde_json::to_value(value)?)
    }

    async fn record_success(&self, key: &CacheKey, value: &Value) {
        self.freshness.mark_fetched(key.domain);
        if let Some(p) = &self.persisted {
            let (p, name, value) = (p.clone(), key.to_string(), value.clone());
            let written = tokio::task::spawn_blocking(move || p.store_quietly(&name, &value)).await;
            if let Err(e) = written {
                warn!(key = %key, error = %e, "persisted cache write task failed");
            }
        }
    }

    async fn fallback<T: DeserializeOwned>(&self, key: &CacheKey, error: &ChainError) -> Option<T> {
        let persisted = match &self.persisted {
            Some(p) => {
                let (p, name) = (p.clone(), key.to_string());
                match tokio::task::spawn_blocking(move || p.load(&name)).await {
                    Ok(found) => found.and_then(|v| decode(v).ok()),
                    Err(e) => {
                        warn!(key = %key, error = %e, "persisted cache read task failed");
                        None
                    }
                }
            }
            None => None,
        };

        match persisted {
            Some(value) => {
                self.metrics.persisted_fallbacks.inc();
                warn!(key = %key, error = %error, "serving persisted fallback");
                Some(value)
            }
            None => {
                self.metrics.degraded_reads.inc();
                warn!(key = %key, error = %error, "read degraded to empty result");
                None
            }
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ChainError> {
    serde_json::from_value(value).map_err(|e| {
        debug!(error = %e, "cached value has unexpected shape");
        ChainError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            rate_limit_delay: Duration::from_millis(20),
            jitter: Duration::ZERO,
        }
    }

    fn pipeline() -> ReadPipeline {
        ReadPipeline::new(
            fast_retry(),
            RequestLimiter::new(3),
            FreshnessPolicy::default(),
            Arc::new(ChainMetrics::new()),
        )
    }

    fn key() -> CacheKey {
        CacheKey::new(CacheDomain::CampaignList, "all")
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_read_within_ttl_is_cached() {
        let p = pipeline();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..3 {
            let v: Option<Vec<String>> = p
                .fetch(&key(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["0x1".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(v, Some(vec!["0x1".to_string()]));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(p.freshness().is_fresh(CacheDomain::CampaignList));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_network_degrades_to_none() {
        let p = pipeline();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let v: Option<u64> = p
            .fetch(&key(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ChainError::Network("connection refused".into()))
            })
            .await
            .unwrap();

        assert_eq!(v, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(p.metrics().degraded_reads.get(), 1);
        assert_eq!(p.metrics().rpc_calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_propagates() {
        let p = pipeline();
        let err = p
            .fetch::<u64, _, _>(&key(), || async { Err(ChainError::Decode("bad".into())) })
            .await
            .unwrap_err();
        assert_eq!(err, ChainError::Decode("bad".into()));
        assert_eq!(p.metrics().degraded_reads.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cache_beats_persisted() {
        let p = pipeline();
        p.fetch(&key(), || async { Ok(1u64) }).await.unwrap();
        p.invalidate(CacheDomain::CampaignList);

        let v: Option<u64> = p
            .fetch(&key(), || async { Err(ChainError::RateLimited { retry_after_ms: None }) })
            .await
            .unwrap();
        assert_eq!(v, Some(1));
        assert_eq!(p.metrics().cache_stale_served.get(), 1);
        assert_eq!(p.metrics().rate_limit_retries.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_fallback_after_restart() {
        let dir = TempDir::new().unwrap();
        let persisted = PersistedCache::new(dir.path(), Duration::from_secs(1800));

        let before = pipeline().with_persisted(persisted.clone());
        before.fetch(&key(), || async { Ok(vec![7u64, 8]) }).await.unwrap();

        // Fresh process: empty memory cache, same directory.
        let after = pipeline().with_persisted(persisted);
        let v: Option<Vec<u64>> = after
            .fetch(&key(), || async { Err(ChainError::Network("down".into())) })
            .await
            .unwrap();
        assert_eq!(v, Some(vec![7, 8]));
        assert_eq!(after.metrics().persisted_fallbacks.get(), 1);
    }

    #[tokio::test]
    async fn test_persisted_write_completes_before_fetch_returns() {
        let dir = TempDir::new().unwrap();
        let persisted = PersistedCache::new(dir.path(), Duration::from_secs(60));
        let p = pipeline().with_persisted(persisted.clone());

        p.fetch(&key(), || async { Ok(3u64) }).await.unwrap();
        assert_eq!(persisted.load(&key().to_string()), Some(serde_json::json!(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let p = pipeline();
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let op = move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst) as u64) };

        assert_eq!(p.fetch(&key(), op).await.unwrap(), Some(0));
        assert_eq!(p.fetch(&key(), op).await.unwrap(), Some(0));
        p.invalidate(CacheDomain::CampaignList);
        assert_eq!(p.fetch(&key(), op).await.unwrap(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authoritative_read_bypasses_and_refreshes_cache() {
        let p = pipeline();
        p.fetch(&key(), || async { Ok(1u64) }).await.unwrap();

        let v: u64 = p.fetch_authoritative(&key(), || async { Ok(2u64) }).await.unwrap();
        assert_eq!(v, 2);

        let cached: Option<u64> = p
            .fetch(&key(), || async { Err(ChainError::Decode("unused".into())) })
            .await
            .unwrap();
        assert_eq!(cached, Some(2));

        let err = p
            .fetch_authoritative::<u64, _, _>(&key(), || async {
                Err(ChainError::Network("down".into()))
            })
            .await
            .unwrap_err();
        assert!(err.is_degradable());
    }
}
