//! # Campaign Read Service
//!
//! Semua read campaign, event donasi, dan saldo lewat [`ReadPipeline`];
//! nilai raised yang ditampilkan lewat [`FundingLedger`].
//!
//! ## Alur
//!
//! 1. `list_campaigns`: event `CampaignCreated` → id → `sui_multiGetObjects`
//! 2. `get_campaign`: `sui_getObject` untuk satu id
//! 3. Setiap fetch authoritative yang sukses meng-`confirm` ledger
//! 4. `record_donation_submitted`: ledger optimistic + invalidasi domain
//!    `CampaignList`, `CampaignDetail`, `TokenBalance`
//!
//! Nilai dari cache hit, stale entry, atau persisted fallback tidak
//! menyentuh ledger.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use suigives_common::{normalize_address, AppConfig, Campaign, CoinType, DonationEvent, FundingProgress};
use tracing::{debug, info, warn};

use crate::cache::CacheKey;
use crate::error::ChainError;
use crate::freshness::CacheDomain;
use crate::ledger::{FundingLedger, RaisedAmount};
use crate::parse::{parse_campaign, parse_campaign_created, parse_donation_event};
use crate::pipeline::ReadPipeline;
use crate::rpc::{ChainRpc, EventCursor, EventPage};

/// Events per `suix_queryEvents` page when listing campaigns.
pub const EVENT_PAGE_SIZE: usize = 50;
/// Upper bound on pages walked when listing campaigns.
pub const MAX_CAMPAIGN_EVENT_PAGES: usize = 40;
/// `sui_multiGetObjects` batch size accepted by public full nodes.
pub const MULTI_GET_BATCH: usize = 50;

/// Campaign with displayed (possibly optimistic) amounts and progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub progress: FundingProgress,
    pub confirmed_raised_sui: u64,
    pub confirmed_raised_sgusd: u64,
    /// Displayed amounts include donations not yet read back from chain.
    pub optimistic: bool,
}

pub struct CampaignService {
    rpc: Arc<dyn ChainRpc>,
    pipeline: ReadPipeline,
    ledger: FundingLedger,
    package_id: String,
    module_name: String,
}

impl CampaignService {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        pipeline: ReadPipeline,
        package_id: impl Into<String>,
        module_name: impl Into<String>,
    ) -> Self {
        Self {
            rpc,
            pipeline,
            ledger: FundingLedger::new(),
            package_id: package_id.into(),
            module_name: module_name.into(),
        }
    }

    pub fn from_config(cfg: &AppConfig, rpc: Arc<dyn ChainRpc>, pipeline: ReadPipeline) -> Self {
        Self::new(rpc, pipeline, cfg.package_id.clone(), cfg.chain.module_name.clone())
    }

    pub fn pipeline(&self) -> &ReadPipeline {
        &self.pipeline
    }

    pub fn ledger(&self) -> &FundingLedger {
        &self.ledger
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Fully qualified Move event type, e.g. `0x1::crowdfunding::DonationReceived`.
    pub fn event_type(&self, name: &str) -> String {
        format!("{}::{}::{}", self.package_id, self.module_name, name)
    }

    // ════════════════════════════════════════════════════════════════════════
    // CAMPAIGNS
    // ════════════════════════════════════════════════════════════════════════

    /// All campaigns. `Ok(None)` when the chain is unreachable and nothing
    /// is cached.
    pub async fn list_campaigns(&self) -> Result<Option<Vec<Campaign>>, ChainError> {
        let key = CacheKey::new(CacheDomain::CampaignList, "all");
        self.pipeline.fetch(&key, || self.load_all_campaigns()).await
    }

    /// Every campaign straight from the chain, bypassing all cache layers.
    /// Errors are returned, not degraded.
    pub async fn list_campaigns_authoritative(&self) -> Result<Vec<Campaign>, ChainError> {
        let key = CacheKey::new(CacheDomain::CampaignList, "all");
        self.pipeline.fetch_authoritative(&key, || self.load_all_campaigns()).await
    }

    /// One campaign. `Ok(None)` when it does not exist or the chain is
    /// unreachable with nothing cached.
    pub async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, ChainError> {
        let Some(id) = normalize_address(id) else {
            return Ok(None);
        };
        let key = CacheKey::new(CacheDomain::CampaignDetail, id.as_str());
        let id = id.as_str();
        let found = self.pipeline.fetch(&key, move || self.load_campaign(id)).await?;
        Ok(found.flatten())
    }

    /// Bypass every cache layer. Errors are returned, not degraded.
    pub async fn get_campaign_authoritative(&self, id: &str) -> Result<Option<Campaign>, ChainError> {
        let id = normalize_address(id)
            .ok_or_else(|| ChainError::Decode(format!("invalid campaign id: {}", id)))?;
        let key = CacheKey::new(CacheDomain::CampaignDetail, id.as_str());
        let id = id.as_str();
        self.pipeline.fetch_authoritative(&key, move || self.load_campaign(id)).await
    }

    /// Campaign with ledger amounts applied.
    pub async fn campaign_view(&self, id: &str) -> Result<Option<CampaignView>, ChainError> {
        Ok(self.get_campaign(id).await?.map(|c| self.view_of(c)))
    }

    /// All campaigns as views, optionally filtered by category
    /// (case-insensitive).
    pub async fn list_views(&self, category: Option<&str>) -> Result<Option<Vec<CampaignView>>, ChainError> {
        let Some(campaigns) = self.list_campaigns().await? else {
            return Ok(None);
        };
        let wanted = category.map(str::to_ascii_lowercase);
        Ok(Some(
            campaigns
                .into_iter()
                .filter(|c| wanted.as_deref().map_or(true, |w| c.category.eq_ignore_ascii_case(w)))
                .map(|c| self.view_of(c))
                .collect(),
        ))
    }

    /// Overlay displayed ledger amounts on `campaign`. Pending amounts with
    /// no known chain base are added to the campaign's own raised value.
    pub fn view_of(&self, mut campaign: Campaign) -> CampaignView {
        let confirmed_raised_sui = campaign.raised_sui;
        let confirmed_raised_sgusd = campaign.raised_sgusd;
        let mut optimistic = false;

        for coin in CoinType::ALL {
            if let Some(amount) = self.ledger.get(&campaign.id, coin) {
                if amount.is_optimistic() {
                    optimistic = true;
                    let base = campaign.raised(coin);
                    campaign.set_raised(coin, amount.displayed_over(base));
                }
            }
        }

        CampaignView {
            progress: campaign.progress(),
            campaign,
            confirmed_raised_sui,
            confirmed_raised_sgusd,
            optimistic,
        }
    }

    /// Record a submitted donation transaction before chain confirmation.
    /// Returns the ledger state for that coin; its base is unknown when the
    /// chain was unreachable with nothing cached.
    pub async fn record_donation_submitted(
        &self,
        campaign_id: &str,
        coin: CoinType,
        amount: u64,
    ) -> Result<RaisedAmount, ChainError> {
        let id = normalize_address(campaign_id)
            .ok_or_else(|| ChainError::Decode(format!("invalid campaign id: {}", campaign_id)))?;

        // Seed the ledger so the optimistic amount adds to a real base.
        if self.ledger.get(&id, coin).is_none() {
            if let Some(c) = self.get_campaign(&id).await? {
                if self.ledger.get(&id, coin).is_none() {
                    self.ledger.confirm(&id, coin, c.raised(coin));
                }
            }
        }

        let state = self.ledger.apply_optimistic(&id, coin, amount);
        self.invalidate_after_write();
        info!(campaign_id = %id, coin = %coin, amount, total = ?state.total(), "donation submitted");
        Ok(state)
    }

    /// Invalidate the domains a write transaction can change.
    pub fn invalidate_after_write(&self) {
        self.pipeline.invalidate(CacheDomain::CampaignList);
        self.pipeline.invalidate(CacheDomain::CampaignDetail);
        self.pipeline.invalidate(CacheDomain::TokenBalance);
    }

    async fn load_campaign(&self, id: &str) -> Result<Option<Campaign>, ChainError> {
        let Some(object) = self.rpc.get_object(id).await? else {
            debug!(campaign_id = id, "campaign object not found");
            return Ok(None);
        };
        let campaign = parse_campaign(&object)?;
        self.confirm(&campaign);
        Ok(Some(campaign))
    }

    async fn load_all_campaigns(&self) -> Result<Vec<Campaign>, ChainError> {
        let ids = self.campaign_ids().await?;
        let mut campaigns = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MULTI_GET_BATCH) {
            for object in self.rpc.multi_get_objects(chunk).await? {
                match parse_campaign(&object) {
                    Ok(c) => {
                        self.confirm(&c);
                        campaigns.push(c);
                    }
                    Err(e) => warn!(error = %e, "skipping unparseable campaign object"),
                }
            }
        }
        debug!(count = campaigns.len(), "campaigns loaded from chain");
        Ok(campaigns)
    }

    async fn campaign_ids(&self) -> Result<Vec<String>, ChainError> {
        let event_type = self.event_type("CampaignCreated");
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        let mut cursor = None;

        for _ in 0..MAX_CAMPAIGN_EVENT_PAGES {
            let page = self.rpc.query_events(&event_type, cursor, EVENT_PAGE_SIZE).await?;
            for event in &page.data {
                match parse_campaign_created(event) {
                    Ok(id) if seen.insert(id.clone()) => ids.push(id),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "skipping malformed CampaignCreated event"),
                }
            }
            if !page.has_next_page || page.next_cursor.is_none() {
                return Ok(ids);
            }
            cursor = page.next_cursor;
        }

        warn!(pages = MAX_CAMPAIGN_EVENT_PAGES, "campaign listing truncated");
        Ok(ids)
    }

    fn confirm(&self, campaign: &Campaign) {
        for coin in CoinType::ALL {
            self.ledger.confirm(&campaign.id, coin, campaign.raised(coin));
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // EVENTS AND BALANCES
    // ════════════════════════════════════════════════════════════════════════

    /// One page of donation events after `cursor`. Malformed events are
    /// skipped; the cursor still advances past them.
    pub async fn donation_events(
        &self,
        cursor: Option<EventCursor>,
        limit: usize,
    ) -> Result<Option<EventPage<DonationEvent>>, ChainError> {
        let name = match &cursor {
            Some(c) => format!("{}:{}:{}", c.tx_digest, c.event_seq, limit),
            None => format!("start:{}", limit),
        };
        let key = CacheKey::new(CacheDomain::DonationEvents, name);
        let event_type = self.event_type("DonationReceived");
        let event_type = event_type.as_str();
        let cursor = &cursor;

        let page: Option<EventPage<Value>> = self
            .pipeline
            .fetch(&key, move || self.rpc.query_events(event_type, cursor.clone(), limit))
            .await?;

        Ok(page.map(|page| EventPage {
            data: page
                .data
                .iter()
                .filter_map(|raw| match parse_donation_event(raw) {
                    Ok(ev) => Some(ev),
                    Err(e) => {
                        warn!(error = %e, "skipping malformed DonationReceived event");
                        None
                    }
                })
                .collect(),
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        }))
    }

    /// Coin balance of a wallet, cached under `TokenBalance`.
    pub async fn balance(&self, owner: &str, coin: CoinType) -> Result<Option<u64>, ChainError> {
        let Some(owner) = normalize_address(owner) else {
            return Ok(None);
        };
        let key = CacheKey::new(CacheDomain::TokenBalance, format!("{}:{}", owner, coin));
        let tag = coin.type_tag(&self.package_id);
        let (owner, tag) = (owner.as_str(), tag.as_str());
        self.pipeline.fetch(&key, move || self.rpc.get_balance(owner, tag)).await
    }
}
