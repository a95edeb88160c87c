//! # Cache Invalidation Policy
//!
//! State machine per domain cache:
//!
//! ```text
//! FRESH ──(TTL elapsed | invalidate)──► STALE ──(successful fetch)──► FRESH
//! ```
//!
//! - Read pada domain FRESH dilayani dari memory
//! - Read pada domain STALE memicu fetch lewat pipeline
//! - Setiap write transaction yang sukses harus diikuti `invalidate`
//! - Domain saling independen; `invalidate_all` berlaku untuk semua

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::RwLock;
use suigives_common::config::CacheConfig;
use tokio::time::Instant;
use tracing::debug;

/// Logical data domain with its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheDomain {
    /// All campaigns (minutes).
    CampaignList,
    /// Single campaign object.
    CampaignDetail,
    /// Wallet coin balances (tens of seconds).
    TokenBalance,
    /// Donation event pages.
    DonationEvents,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 4] = [
        CacheDomain::CampaignList,
        CacheDomain::CampaignDetail,
        CacheDomain::TokenBalance,
        CacheDomain::DonationEvents,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheDomain::CampaignList => "campaigns",
            CacheDomain::CampaignDetail => "campaign",
            CacheDomain::TokenBalance => "balance",
            CacheDomain::DonationEvents => "donation_events",
        }
    }
}

impl fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a domain may be served from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    Fresh,
    Stale,
}

/// Per-domain TTLs and last-fetch timestamps.
#[derive(Debug)]
pub struct FreshnessPolicy {
    ttls: HashMap<CacheDomain, Duration>,
    last_fetched: RwLock<HashMap<CacheDomain, Instant>>,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl FreshnessPolicy {
    pub fn from_config(cfg: &CacheConfig) -> Self {
        let ttls = HashMap::from([
            (CacheDomain::CampaignList, Duration::from_secs(cfg.campaign_list_ttl_secs)),
            (CacheDomain::CampaignDetail, Duration::from_secs(cfg.campaign_detail_ttl_secs)),
            (CacheDomain::TokenBalance, Duration::from_secs(cfg.token_balance_ttl_secs)),
            (CacheDomain::DonationEvents, Duration::from_secs(cfg.donation_events_ttl_secs)),
        ]);
        Self { ttls, last_fetched: RwLock::new(HashMap::new()) }
    }

    /// Override one domain's TTL.
    pub fn with_ttl(mut self, domain: CacheDomain, ttl: Duration) -> Self {
        self.ttls.insert(domain, ttl);
        self
    }

    pub fn ttl(&self, domain: CacheDomain) -> Duration {
        self.ttls.get(&domain).copied().unwrap_or_default()
    }

    pub fn state(&self, domain: CacheDomain) -> DomainState {
        let ttl = self.ttl(domain);
        match self.last_fetched.read().get(&domain) {
            Some(at) if at.elapsed() < ttl => DomainState::Fresh,
            _ => DomainState::Stale,
        }
    }

    pub fn is_fresh(&self, domain: CacheDomain) -> bool {
        self.state(domain) == DomainState::Fresh
    }

    /// Record a successful authoritative fetch.
    pub fn mark_fetched(&self, domain: CacheDomain) {
        self.last_fetched.write().insert(domain, Instant::now());
    }

    /// Force the domain to STALE.
    pub fn invalidate(&self, domain: CacheDomain) {
        debug!(domain = %domain, "cache domain invalidated");
        self.last_fetched.write().remove(&domain);
    }

    /// Process-wide invalidation of every domain.
    pub fn invalidate_all(&self) {
        debug!("all cache domains invalidated");
        self.last_fetched.write().clear();
    }

    /// Age of the last fetch, if any.
    pub fn age(&self, domain: CacheDomain) -> Option<Duration> {
        self.last_fetched.read().get(&domain).map(|at| at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fresh_until_ttl_elapses() {
        let policy = FreshnessPolicy::default()
            .with_ttl(CacheDomain::TokenBalance, Duration::from_secs(30));

        assert_eq!(policy.state(CacheDomain::TokenBalance), DomainState::Stale);
        policy.mark_fetched(CacheDomain::TokenBalance);
        assert_eq!(policy.state(CacheDomain::TokenBalance), DomainState::Fresh);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(policy.is_fresh(CacheDomain::TokenBalance));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!policy.is_fresh(CacheDomain::TokenBalance));
    }

    #[tokio::test(start_paused = true)]
    async fn test_domains_invalidate_independently() {
        let policy = FreshnessPolicy::default();
        policy.mark_fetched(CacheDomain::CampaignList);
        policy.mark_fetched(CacheDomain::TokenBalance);

        policy.invalidate(CacheDomain::TokenBalance);

        assert!(policy.is_fresh(CacheDomain::CampaignList));
        assert!(!policy.is_fresh(CacheDomain::TokenBalance));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_all() {
        let policy = FreshnessPolicy::default();
        for d in CacheDomain::ALL {
            policy.mark_fetched(d);
        }
        policy.invalidate_all();
        for d in CacheDomain::ALL {
            assert_eq!(policy.state(d), DomainState::Stale);
            assert!(policy.age(d).is_none());
        }
    }

    #[test]
    fn test_default_ttls_match_config() {
        let policy = FreshnessPolicy::default();
        assert_eq!(policy.ttl(CacheDomain::CampaignList), Duration::from_secs(300));
        assert_eq!(policy.ttl(CacheDomain::TokenBalance), Duration::from_secs(30));
    }
}
