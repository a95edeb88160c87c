//! # Domain Model
//!
//! Entitas yang di-mirror dari chain ke database.
//!
//! ## Invariant
//!
//! - Chain adalah sumber kebenaran; struct di sini hanya salinan
//! - `raised_*` monoton naik dari sudut pandang chain
//! - `Donation::tx_digest` unik; import bersifat idempotent
//! - Aggregate `UserProfile` selalu dihitung ulang dari record donasi

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::amount::FundingProgress;
use crate::coin::CoinType;

/// Get current timestamp in Unix milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Normalize a Sui address or object id: trimmed, lowercase, `0x` prefix.
///
/// Returns `None` if the remainder is empty or not hex.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex.to_ascii_lowercase()))
}

// ════════════════════════════════════════════════════════════════════════════
// CAMPAIGN
// ════════════════════════════════════════════════════════════════════════════

/// On-chain fundraising campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    /// Object id of the campaign.
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    /// Goal in SUI smallest units (9 decimals).
    pub goal_amount: u64,
    pub raised_sui: u64,
    pub raised_sgusd: u64,
    /// Deadline (Unix milliseconds).
    pub deadline_ms: u64,
    pub category: String,
    pub creator: String,
    pub backer_count: u64,
    pub created_at_ms: u64,
    pub is_active: bool,
    pub ended: bool,
}

impl Campaign {
    /// Funding summary; only SUI counts toward the goal.
    pub fn progress(&self) -> FundingProgress {
        FundingProgress::compute(
            Some(self.goal_amount),
            Some(self.raised_sui),
            Some(self.raised_sgusd),
        )
    }

    pub fn is_funded(&self) -> bool {
        self.goal_amount > 0 && self.raised_sui >= self.goal_amount
    }

    /// Ended explicitly or past its deadline.
    pub fn has_ended(&self, now_ms: u64) -> bool {
        self.ended || (self.deadline_ms > 0 && now_ms >= self.deadline_ms)
    }

    /// Raised amount for a coin.
    pub fn raised(&self, coin: CoinType) -> u64 {
        match coin {
            CoinType::Sui => self.raised_sui,
            CoinType::SgUsd => self.raised_sgusd,
        }
    }

    /// Overwrite the raised amount for a coin.
    pub fn set_raised(&mut self, coin: CoinType, amount: u64) {
        match coin {
            CoinType::Sui => self.raised_sui = amount,
            CoinType::SgUsd => self.raised_sgusd = amount,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DONATION
// ════════════════════════════════════════════════════════════════════════════

/// A confirmed donation as mirrored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    /// Transaction digest; unique import key.
    pub tx_digest: String,
    pub campaign_id: String,
    /// Donor address, `None` when the donor chose anonymity.
    pub donor: Option<String>,
    pub amount: u64,
    pub coin_type: CoinType,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_anonymous: bool,
    pub timestamp_ms: u64,
}

impl Donation {
    /// Apply anonymity and address normalization before storage.
    ///
    /// Anonymous donations never keep a donor address.
    pub fn normalized(mut self) -> Self {
        self.campaign_id = normalize_address(&self.campaign_id).unwrap_or(self.campaign_id);
        self.donor = if self.is_anonymous {
            None
        } else {
            self.donor.as_deref().and_then(normalize_address)
        };
        self
    }
}

/// Donation event as emitted by the crowdfunding module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationEvent {
    pub tx_digest: String,
    pub event_seq: u64,
    pub campaign_id: String,
    pub donor: String,
    pub amount: u64,
    pub coin_type: CoinType,
    pub message: String,
    pub is_anonymous: bool,
    pub timestamp_ms: u64,
}

impl DonationEvent {
    /// Convert into the stored record.
    pub fn into_donation(self) -> Donation {
        Donation {
            tx_digest: self.tx_digest,
            campaign_id: self.campaign_id,
            donor: Some(self.donor),
            amount: self.amount,
            coin_type: self.coin_type,
            message: self.message,
            is_anonymous: self.is_anonymous,
            timestamp_ms: self.timestamp_ms,
        }
        .normalized()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// USER PROFILE
// ════════════════════════════════════════════════════════════════════════════

/// Aggregates of a donor, recomputed from donation records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationAggregates {
    pub total_donated_sui: u64,
    pub total_donated_sgusd: u64,
    pub donation_count: u64,
    pub first_donation_ms: Option<u64>,
    pub last_donation_ms: Option<u64>,
}

/// Public-facing profile fields editable by the owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub show_donations: bool,
}

fn default_true() -> bool {
    true
}

/// User profile keyed by account address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub address: String,
    #[serde(flatten)]
    pub aggregates: DonationAggregates,
    #[serde(flatten)]
    pub profile: ProfileFields,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl UserProfile {
    /// Copy for anonymous viewers: hides fields the owner marked private.
    pub fn public_view(&self) -> UserProfile {
        let mut view = self.clone();
        if !self.profile.is_public {
            view.profile = ProfileFields {
                is_public: false,
                show_donations: self.profile.show_donations,
                ..ProfileFields::default()
            };
        }
        if !self.profile.show_donations {
            view.aggregates = DonationAggregates::default();
        }
        view
    }
}
