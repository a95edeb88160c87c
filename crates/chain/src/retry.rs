//! # Retry Policy
//!
//! Retry untuk RPC read dengan dua kelas kegagalan:
//!
//! | Class | Delay sebelum retry ke-n (n mulai 0) |
//! |-------|--------------------------------------|
//! | Network | `min(base * 2^n, max) + jitter acak` |
//! | RateLimited | `max(rate_limit_delay * (n + 1), Retry-After)` |
//! | Fatal | tidak di-retry |
//!
//! Setelah retry habis, error terakhir dikembalikan apa adanya; keputusan
//! degradasi (stale / persisted / None) ada di pipeline.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use suigives_common::config::ChainConfig;
use tracing::{debug, warn};

use crate::error::{ChainError, FailureClass};
use crate::metrics::ChainMetrics;

/// Default extra attempts after the first.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub rate_limit_delay: Duration,
    /// Upper bound of the random extra delay on network retries.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            rate_limit_delay: Duration::from_secs(2),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &ChainConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.base_retry_delay_ms),
            max_delay: Duration::from_millis(cfg.max_retry_delay_ms),
            rate_limit_delay: Duration::from_millis(cfg.rate_limit_delay_ms),
            jitter: Duration::from_millis(cfg.retry_jitter_ms),
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delay before retry number `attempt` (0-based), or `None` when the
    /// error must not be retried.
    pub fn delay_for(&self, error: &ChainError, attempt: u32) -> Option<Duration> {
        match error.class() {
            FailureClass::Network => {
                let factor = 2u32.saturating_pow(attempt);
                let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
                Some(backoff + self.random_jitter())
            }
            FailureClass::RateLimited => {
                let linear = self.rate_limit_delay.saturating_mul(attempt.saturating_add(1));
                let hinted = match error {
                    ChainError::RateLimited { retry_after_ms: Some(ms) } => Duration::from_millis(*ms),
                    _ => Duration::ZERO,
                };
                Some(linear.max(hinted))
            }
            FailureClass::Fatal => None,
        }
    }

    fn random_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Run `op` until it succeeds, fails fatally, or retries run out.
    pub async fn run<T, F, Fut>(&self, metrics: Option<&ChainMetrics>, mut op: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let mut attempt = 0u32;
        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                warn!(error = %error, attempts = attempt + 1, "retries exhausted");
                return Err(error);
            }
            let Some(delay) = self.delay_for(&error, attempt) else {
                debug!(error = %error, "failure is not retryable");
                return Err(error);
            };

            if let Some(m) = metrics {
                match error.class() {
                    FailureClass::RateLimited => m.rate_limit_retries.inc(),
                    _ => m.network_retries.inc(),
                }
            }
            debug!(
                error = %error,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                "retrying chain read"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            rate_limit_delay: Duration::from_secs(1),
            jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_network_backoff_doubles_and_caps() {
        let p = no_jitter();
        let e = ChainError::Network("reset".into());
        assert_eq!(p.delay_for(&e, 0), Some(Duration::from_millis(100)));
        assert_eq!(p.delay_for(&e, 1), Some(Duration::from_millis(200)));
        assert_eq!(p.delay_for(&e, 2), Some(Duration::from_millis(250)));
        assert_eq!(p.delay_for(&e, 40), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let p = RetryPolicy { jitter: Duration::from_millis(50), ..no_jitter() };
        let e = ChainError::Network("reset".into());
        for _ in 0..100 {
            let d = p.delay_for(&e, 0).unwrap();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_rate_limit_delay_is_linear_and_honors_hint() {
        let p = no_jitter();
        let e = ChainError::RateLimited { retry_after_ms: None };
        assert_eq!(p.delay_for(&e, 0), Some(Duration::from_secs(1)));
        assert_eq!(p.delay_for(&e, 2), Some(Duration::from_secs(3)));

        let hinted = ChainError::RateLimited { retry_after_ms: Some(5_000) };
        assert_eq!(p.delay_for(&hinted, 0), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_fatal_not_retried() {
        let p = no_jitter();
        assert_eq!(p.delay_for(&ChainError::Decode("x".into()), 0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_network_errors() {
        let p = no_jitter();
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let metrics = ChainMetrics::new();
        let start = Instant::now();

        let result = p
            .run(Some(&metrics), move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ChainError::Network("timeout".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert_eq!(metrics.network_retries.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_waits_longer() {
        let p = no_jitter();
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let start = Instant::now();

        let result = p
            .run(None, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ChainError::RateLimited { retry_after_ms: None })
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let p = no_jitter();
        let seen = Mutex::new(Vec::new());
        let seen = &seen;

        let result: Result<(), _> = p
            .run(None, move || async move {
                let mut s = seen.lock();
                let n = s.len();
                s.push(n);
                Err(ChainError::Network(format!("fail {}", s.len())))
            })
            .await;

        assert_eq!(result, Err(ChainError::Network("fail 4".into())));
        assert_eq!(seen.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_fatal_returns_immediately() {
        let p = no_jitter();
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), _> = p
            .run(None, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ChainError::Rpc { code: -32602, message: "invalid params".into() })
            })
            .await;
        assert!(matches!(result, Err(ChainError::Rpc { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
