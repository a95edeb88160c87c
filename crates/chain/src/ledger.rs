//! # Optimistic Funding Ledger
//!
//! Nilai raised per `(campaign_id, coin)` yang ditampilkan ke user sebelum
//! chain mengkonfirmasi transaksi donasi.
//!
//! ```text
//! (none) ──apply_optimistic──► Optimistic{confirmed: None, pending}
//! Confirmed(v) ──apply_optimistic──► Optimistic{confirmed: Some(v), pending}
//!                                         │ apply_optimistic (pending += x)
//! any ──────────────confirm───────────────┴──► Confirmed(v)
//! ```
//!
//! - `confirm` selalu menimpa state apapun: nilai chain menang
//! - `displayed` = confirmed + pending
//! - Tanpa nilai chain (`confirmed: None`, misalnya chain down setelah
//!   restart), pending adalah delta di atas base terakhir yang dipegang
//!   pembaca (cache atau mirror database)
//! - `confirmed` tidak pernah memasukkan pending; hanya nilai ini yang
//!   boleh ditulis ke storage

use std::collections::HashMap;

use parking_lot::RwLock;
use suigives_common::CoinType;
use tracing::debug;

/// Raised amount for one campaign and coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaisedAmount {
    Confirmed(u64),
    Optimistic { confirmed: Option<u64>, pending: u64 },
}

impl RaisedAmount {
    /// Last chain value, if one was ever read.
    pub fn confirmed(self) -> Option<u64> {
        match self {
            RaisedAmount::Confirmed(v) => Some(v),
            RaisedAmount::Optimistic { confirmed, .. } => confirmed,
        }
    }

    pub fn pending(self) -> u64 {
        match self {
            RaisedAmount::Confirmed(_) => 0,
            RaisedAmount::Optimistic { pending, .. } => pending,
        }
    }

    /// Displayed total; `None` when the base is unknown.
    pub fn total(self) -> Option<u64> {
        self.confirmed().map(|c| c.saturating_add(self.pending()))
    }

    /// Displayed total, using `base` when no chain value is known.
    pub fn displayed_over(self, base: u64) -> u64 {
        self.confirmed().unwrap_or(base).saturating_add(self.pending())
    }

    pub fn is_optimistic(self) -> bool {
        matches!(self, RaisedAmount::Optimistic { .. })
    }
}

type LedgerKey = (String, CoinType);

#[derive(Debug, Default)]
pub struct FundingLedger {
    entries: RwLock<HashMap<LedgerKey, RaisedAmount>>,
}

impl FundingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a submitted but unconfirmed donation. Returns the new state.
    pub fn apply_optimistic(&self, campaign_id: &str, coin: CoinType, amount: u64) -> RaisedAmount {
        let mut entries = self.entries.write();
        let key = (campaign_id.to_string(), coin);
        let next = match entries.get(&key).copied() {
            None => RaisedAmount::Optimistic { confirmed: None, pending: amount },
            Some(RaisedAmount::Confirmed(v)) => {
                RaisedAmount::Optimistic { confirmed: Some(v), pending: amount }
            }
            Some(RaisedAmount::Optimistic { confirmed, pending }) => {
                RaisedAmount::Optimistic { confirmed, pending: pending.saturating_add(amount) }
            }
        };
        entries.insert(key, next);
        debug!(campaign_id, coin = %coin, amount, pending = next.pending(), "optimistic donation applied");
        next
    }

    /// Record the chain's value, discarding any pending amount.
    pub fn confirm(&self, campaign_id: &str, coin: CoinType, value: u64) {
        let previous = self
            .entries
            .write()
            .insert((campaign_id.to_string(), coin), RaisedAmount::Confirmed(value));
        if let Some(prev) = previous {
            if prev.total() != Some(value) {
                debug!(
                    campaign_id,
                    coin = %coin,
                    displayed = ?prev.total(),
                    confirmed = value,
                    "ledger corrected by chain"
                );
            }
        }
    }

    pub fn get(&self, campaign_id: &str, coin: CoinType) -> Option<RaisedAmount> {
        self.entries.read().get(&(campaign_id.to_string(), coin)).copied()
    }

    /// Displayed total when the ledger knows the chain base.
    pub fn displayed(&self, campaign_id: &str, coin: CoinType) -> Option<u64> {
        self.get(campaign_id, coin).and_then(RaisedAmount::total)
    }

    pub fn confirmed(&self, campaign_id: &str, coin: CoinType) -> Option<u64> {
        self.get(campaign_id, coin).and_then(RaisedAmount::confirmed)
    }

    /// Campaigns with at least one unconfirmed amount.
    pub fn pending_campaigns(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, v)| v.is_optimistic())
            .map(|((id, _), _)| id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
