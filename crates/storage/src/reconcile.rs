//! # Chain → Database Reconciliation
//!
//! Satu run:
//!
//! 1. Baca cursor event donasi dari `storestate`
//! 2. Halaman demi halaman: import donasi (idempotent), simpan cursor
//! 3. Upsert daftar campaign dari read authoritative (tanpa cache)
//! 4. Refresh authoritative setiap campaign yang disentuh donasi baru;
//!    selisih dengan database di-log `warn` dan database ditimpa
//! 5. Tandai campaign yang lewat deadline sebagai ended
//!
//! Kegagalan chain menghentikan run dengan report parsial. Run berikutnya
//! melanjutkan dari cursor terakhir yang tersimpan.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use suigives_chain::{CampaignService, ChainError, EventCursor, EventPage};
use suigives_common::config::ReconcileConfig;
use suigives_common::{current_timestamp_ms, Campaign, DonationEvent};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::DbError;
use crate::queries::{CampaignQueries, DonationQueries, ImportOutcome, StateQueries};
use crate::schema::{STATE_DONATION_CURSOR, STATE_LAST_RECONCILE};
use crate::Database;

/// Chain reads the reconciler needs.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Donation events after `cursor`; `Ok(None)` when the chain is
    /// unavailable.
    async fn donation_page(
        &self,
        cursor: Option<EventCursor>,
        limit: usize,
    ) -> Result<Option<EventPage<DonationEvent>>, ChainError>;

    /// Uncached read of every campaign. Cached, stale or persisted copies
    /// must never reach the mirror.
    async fn campaign_list(&self) -> Result<Vec<Campaign>, ChainError>;

    /// Uncached read of one campaign.
    async fn campaign(&self, id: &str) -> Result<Option<Campaign>, ChainError>;
}

#[async_trait]
impl ChainSource for CampaignService {
    async fn donation_page(
        &self,
        cursor: Option<EventCursor>,
        limit: usize,
    ) -> Result<Option<EventPage<DonationEvent>>, ChainError> {
        self.donation_events(cursor, limit).await
    }

    async fn campaign_list(&self) -> Result<Vec<Campaign>, ChainError> {
        self.list_campaigns_authoritative().await
    }

    async fn campaign(&self, id: &str) -> Result<Option<Campaign>, ChainError> {
        self.get_campaign_authoritative(id).await
    }
}

#[derive(Debug, Error)]
enum ReconcileError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("chain unavailable: {0}")]
    Unavailable(&'static str),
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub pages: usize,
    pub events_seen: usize,
    pub donations_imported: usize,
    pub duplicates: usize,
    pub donors_touched: usize,
    pub campaigns_refreshed: usize,
    /// Campaigns whose stored values differed from chain.
    pub campaign_mismatches: usize,
    pub campaigns_ended: usize,
    /// Event stream read to its end and every step succeeded.
    pub complete: bool,
    pub error: Option<String>,
    pub cursor: Option<EventCursor>,
}

pub struct Reconciler<S: ChainSource> {
    source: Arc<S>,
    db: Arc<Database>,
    page_size: usize,
    max_pages: usize,
    running: tokio::sync::Mutex<()>,
}

impl<S: ChainSource> Reconciler<S> {
    pub fn new(source: Arc<S>, db: Arc<Database>, page_size: usize, max_pages: usize) -> Self {
        Self {
            source,
            db,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            running: tokio::sync::Mutex::new(()),
        }
    }

    pub fn from_config(cfg: &ReconcileConfig, source: Arc<S>, db: Arc<Database>) -> Self {
        Self::new(source, db, cfg.page_size, cfg.max_pages)
    }

    /// Run once. Never fails; problems are reported in the result.
    ///
    /// A run that starts while another is in progress returns immediately.
    pub async fn run(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let Ok(_guard) = self.running.try_lock() else {
            report.error = Some("reconciliation already running".into());
            return report;
        };

        match self.run_inner(&mut report).await {
            Ok(()) => info!(
                imported = report.donations_imported,
                duplicates = report.duplicates,
                refreshed = report.campaigns_refreshed,
                mismatches = report.campaign_mismatches,
                complete = report.complete,
                "reconciliation finished"
            ),
            Err(e) => {
                warn!(error = %e, pages = report.pages, "reconciliation stopped early");
                report.complete = false;
                report.error = Some(e.to_string());
            }
        }
        report
    }

    async fn run_inner(&self, report: &mut ReconcileReport) -> Result<(), ReconcileError> {
        let mut cursor = self.load_cursor()?;
        let mut touched_campaigns = BTreeSet::new();
        let mut touched_donors = BTreeSet::new();
        let mut exhausted = false;

        while report.pages < self.max_pages {
            let page = self
                .source
                .donation_page(cursor.clone(), self.page_size)
                .await?
                .ok_or(ReconcileError::Unavailable("donation events"))?;
            report.pages += 1;
            report.events_seen += page.data.len();

            let next = page.next_cursor.clone();
            self.db.with_connection(|conn| {
                for event in page.data {
                    let donation = event.into_donation();
                    match conn.import_donation(&donation)? {
                        ImportOutcome::Inserted => {
                            report.donations_imported += 1;
                            touched_campaigns.insert(donation.campaign_id.clone());
                            if let Some(donor) = donation.donor {
                                touched_donors.insert(donor);
                            }
                        }
                        ImportOutcome::Duplicate => report.duplicates += 1,
                    }
                }
                if let Some(next) = &next {
                    let json = serde_json::to_string(next)
                        .map_err(|e| DbError::Invalid(format!("cursor: {}", e)))?;
                    conn.set_state(STATE_DONATION_CURSOR, &json)?;
                }
                Ok(())
            })?;

            if next.is_some() {
                cursor = next;
            }
            if !page.has_next_page || page.next_cursor.is_none() {
                exhausted = true;
                break;
            }
        }
        report.cursor = cursor;
        report.donors_touched = touched_donors.len();
        if !exhausted {
            debug!(pages = report.pages, "page limit reached; continuing next run");
        }

        let campaigns = self.source.campaign_list().await?;
        let now = current_timestamp_ms();
        for campaign in &campaigns {
            self.store_campaign(campaign, now, report)?;
        }

        for id in &touched_campaigns {
            match self.source.campaign(id).await? {
                Some(campaign) => self.store_campaign(&campaign, now, report)?,
                None => warn!(campaign_id = %id, "donation references unknown campaign"),
            }
        }

        self.db.with_connection(|conn| {
            report.campaigns_ended = conn.mark_expired(now)?;
            conn.set_state(STATE_LAST_RECONCILE, &now.to_string())
        })?;

        report.complete = exhausted;
        Ok(())
    }

    fn load_cursor(&self) -> Result<Option<EventCursor>, DbError> {
        let raw = self.db.with_connection(|conn| conn.get_state(STATE_DONATION_CURSOR))?;
        Ok(raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                warn!(error = %e, "stored donation cursor unreadable; starting from the beginning");
                None
            }
        }))
    }

    /// Overwrite the stored campaign with the chain's values.
    fn store_campaign(
        &self,
        chain: &Campaign,
        now_ms: u64,
        report: &mut ReconcileReport,
    ) -> Result<(), DbError> {
        self.db.with_connection(|conn| {
            if let Some(stored) = conn.load_campaign(&chain.id)? {
                if differs(&stored, chain) {
                    warn!(
                        campaign_id = %chain.id,
                        db_raised_sui = stored.raised_sui,
                        chain_raised_sui = chain.raised_sui,
                        db_raised_sgusd = stored.raised_sgusd,
                        chain_raised_sgusd = chain.raised_sgusd,
                        "campaign differs from chain; overwriting"
                    );
                    report.campaign_mismatches += 1;
                }
            }
            conn.upsert_campaign(chain, now_ms)?;
            report.campaigns_refreshed += 1;
            Ok(())
        })
    }
}

fn differs(stored: &Campaign, chain: &Campaign) -> bool {
    stored.raised_sui != chain.raised_sui
        || stored.raised_sgusd != chain.raised_sgusd
        || stored.backer_count != chain.backer_count
        || stored.goal_amount != chain.goal_amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::UserQueries;
    use suigives_chain::mock::{campaign_created_event, donation_event, MockChainRpc};
    use suigives_chain::{ChainMetrics, FreshnessPolicy, ReadPipeline, RequestLimiter, RetryPolicy};
    use suigives_common::CoinType;

    const PKG: &str = "0x1";
    const DONATED: &str = "0x1::crowdfunding::DonationReceived";
    const CREATED: &str = "0x1::crowdfunding::CampaignCreated";

    fn campaign(id: &str, raised_sui: u64) -> Campaign {
        Campaign {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            image_url: String::new(),
            goal_amount: 100,
            raised_sui,
            raised_sgusd: 0,
            deadline_ms: u64::MAX / 4,
            category: "health".into(),
            creator: "0xc".into(),
            backer_count: 0,
            created_at_ms: 1,
            is_active: true,
            ended: false,
        }
    }

    fn event(digest: &str, seq: u64, campaign_id: &str, donor: &str, amount: u64) -> DonationEvent {
        DonationEvent {
            tx_digest: digest.into(),
            event_seq: seq,
            campaign_id: campaign_id.into(),
            donor: donor.into(),
            amount,
            coin_type: CoinType::Sui,
            message: String::new(),
            is_anonymous: false,
            timestamp_ms: seq,
        }
    }

    fn setup(
        page_size: usize,
        max_pages: usize,
    ) -> (Arc<MockChainRpc>, Arc<Database>, Reconciler<CampaignService>) {
        let rpc = Arc::new(MockChainRpc::new());
        rpc.put_campaign(&campaign("0xa1", 30));
        rpc.put_campaign(&campaign("0xa2", 4));
        rpc.push_event(CREATED, campaign_created_event("0xa1", 0));
        rpc.push_event(CREATED, campaign_created_event("0xa2", 1));
        for e in [
            event("D1", 0, "0xa1", "0xd1", 10),
            event("D2", 1, "0xa1", "0xd2", 20),
            event("D3", 2, "0xa2", "0xd1", 4),
        ] {
            rpc.push_event(DONATED, donation_event(&e));
        }

        let pipeline = ReadPipeline::new(
            RetryPolicy::none(),
            RequestLimiter::new(2),
            FreshnessPolicy::default(),
            Arc::new(ChainMetrics::new()),
        );
        let service = Arc::new(CampaignService::new(rpc.clone(), pipeline, PKG, "crowdfunding"));
        let db = Arc::new(Database::open_in_memory().unwrap());
        let reconciler = Reconciler::new(service, db.clone(), page_size, max_pages);
        (rpc, db, reconciler)
    }

    #[tokio::test]
    async fn test_first_run_imports_and_overwrites_mismatch() {
        let (_rpc, db, reconciler) = setup(2, 10);
        // Stale local value for 0xa1.
        db.with_connection(|c| c.upsert_campaign(&campaign("0xa1", 999), 0)).unwrap();

        let report = reconciler.run().await;
        assert!(report.complete, "{:?}", report.error);
        assert_eq!(report.pages, 2);
        assert_eq!(report.events_seen, 3);
        assert_eq!(report.donations_imported, 3);
        assert_eq!(report.donors_touched, 2);
        assert_eq!(report.campaign_mismatches, 1);

        let stored = db.with_connection(|c| c.load_campaign("0xa1")).unwrap().unwrap();
        assert_eq!(stored.raised_sui, 30);

        let d1 = db.with_connection(|c| c.load_user("0xd1")).unwrap().unwrap();
        assert_eq!(d1.aggregates.total_donated_sui, 14);
        assert_eq!(d1.aggregates.donation_count, 2);
    }

    #[tokio::test]
    async fn test_second_run_resumes_from_cursor() {
        let (rpc, db, reconciler) = setup(10, 10);
        reconciler.run().await;

        let late = event("D4", 3, "0xa2", "0xd3", 1);
        rpc.push_event(DONATED, donation_event(&late));

        let report = reconciler.run().await;
        assert!(report.complete, "{:?}", report.error);
        assert_eq!(report.events_seen, 1);
        assert_eq!(report.donations_imported, 1);
        assert_eq!(report.duplicates, 0);
        assert_eq!(db.with_connection(|c| c.list_donations(None, 100)).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_replay_from_start_is_idempotent() {
        let (_rpc, db, reconciler) = setup(10, 10);
        reconciler.run().await;
        let before = db.with_connection(|c| c.load_user("0xd1")).unwrap().unwrap().aggregates;

        db.with_connection(|c| c.set_state(STATE_DONATION_CURSOR, "not json")).unwrap();
        let report = reconciler.run().await;
        assert_eq!(report.duplicates, 3);
        assert_eq!(report.donations_imported, 0);

        let after = db.with_connection(|c| c.load_user("0xd1")).unwrap().unwrap().aggregates;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_chain_outage_gives_partial_report() {
        let (rpc, db, reconciler) = setup(10, 10);
        rpc.fail_next(ChainError::Network("connection refused".into()), 1);

        let report = reconciler.run().await;
        assert!(!report.complete);
        assert!(report.error.is_some());
        assert_eq!(report.donations_imported, 0);
        assert!(db.with_connection(|c| c.get_state(STATE_LAST_RECONCILE)).unwrap().is_none());

        let report = reconciler.run().await;
        assert!(report.complete, "{:?}", report.error);
        assert_eq!(report.donations_imported, 3);
    }

    #[tokio::test]
    async fn test_cached_campaign_list_never_regresses_mirror() {
        let (rpc, db, reconciler) = setup(10, 10);
        reconciler.run().await;

        rpc.put_campaign(&campaign("0xa1", 40));
        rpc.push_event(DONATED, donation_event(&event("D4", 3, "0xa1", "0xd3", 10)));
        let second = reconciler.run().await;
        assert!(second.complete, "{:?}", second.error);
        assert_eq!(second.campaign_mismatches, 1);

        // No new events; the list TTL has not expired.
        let third = reconciler.run().await;
        assert!(third.complete, "{:?}", third.error);
        assert_eq!(third.campaign_mismatches, 0);
        let stored = db.with_connection(|c| c.load_campaign("0xa1")).unwrap().unwrap();
        assert_eq!(stored.raised_sui, 40);
    }

    #[tokio::test]
    async fn test_campaign_list_outage_stops_run() {
        let (rpc, db, reconciler) = setup(10, 10);
        reconciler.run().await;
        reconciler.run().await;

        // The empty page after the cursor is cached; the list read is not.
        rpc.fail_next(ChainError::Network("connection refused".into()), 1);
        let report = reconciler.run().await;
        assert!(!report.complete);
        assert!(report.error.is_some());
        assert_eq!(report.campaigns_refreshed, 0);
        let stored = db.with_connection(|c| c.load_campaign("0xa1")).unwrap().unwrap();
        assert_eq!(stored.raised_sui, 30);
    }

    #[tokio::test]
    async fn test_page_limit_leaves_run_incomplete() {
        let (_rpc, _db, reconciler) = setup(1, 2);

        let first = reconciler.run().await;
        assert!(!first.complete);
        assert!(first.error.is_none());
        assert_eq!(first.donations_imported, 2);

        let second = reconciler.run().await;
        assert!(second.complete);
        assert_eq!(second.donations_imported, 1);
    }
}
