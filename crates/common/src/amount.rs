//! # Amount & Funding Progress
//!
//! Semua amount on-chain adalah integer fixed-point (smallest unit).
//! Goal campaign selalu dalam SUI dengan 9 implied decimals.
//!
//! ## Rules
//!
//! - Progress di-clamp ke `[0, 100]` walaupun raised > goal
//! - Goal 0 atau tidak ada → progress 0 (tidak ada pembagian dengan nol)
//! - Hanya raised SUI yang dibandingkan dengan goal; SGUSD hanya ditampilkan
//! - Formatting memakai dua digit pecahan dengan pembulatan half-up

use serde::{Deserialize, Serialize};

use crate::coin::CoinType;

/// Basis points in 100%.
const FULL_BPS: u128 = 10_000;

/// Fraction digits shown for human-readable amounts.
pub const DISPLAY_FRACTION_DIGITS: u32 = 2;

/// Error saat parsing amount dari input user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount has more than {0} fraction digits")]
    TooPrecise(u32),
    #[error("amount overflows u64")]
    Overflow,
}

/// Progress toward goal as a percentage clamped to `[0, 100]`.
///
/// Computed in integer basis points so large amounts do not lose
/// precision before the final conversion.
pub fn progress_percent(goal: u64, raised: u64) -> f64 {
    if goal == 0 {
        return 0.0;
    }
    let bps = (raised as u128 * FULL_BPS / goal as u128).min(FULL_BPS);
    bps as f64 / 100.0
}

/// Format a raw amount with `decimals` implied places as `"units.xx"`.
pub fn format_amount(raw: u64, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let unit = 10u128.pow(DISPLAY_FRACTION_DIGITS);
    let shown = (raw as u128 * unit + scale / 2) / scale;
    format!(
        "{}.{:0width$}",
        shown / unit,
        shown % unit,
        width = DISPLAY_FRACTION_DIGITS as usize
    )
}

/// Format a raw amount using the coin's own decimals.
pub fn format_coin(raw: u64, coin: CoinType) -> String {
    format_amount(raw, coin.decimals())
}

/// Parse a decimal string (`"12"`, `"0.5"`, `"1_000.25"`) into the raw
/// smallest-unit integer.
pub fn parse_amount(input: &str, decimals: u32) -> Result<u64, AmountError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != '_' && *c != ',').collect();
    if cleaned.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Invalid(input.to_string()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::Invalid(input.to_string()));
    }
    if frac.len() as u32 > decimals {
        return Err(AmountError::TooPrecise(decimals));
    }

    let scale = 10u64.checked_pow(decimals).ok_or(AmountError::Overflow)?;
    let whole_units: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountError::Overflow)?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse().map_err(|_| AmountError::Overflow)?
    };

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or(AmountError::Overflow)
}

// ════════════════════════════════════════════════════════════════════════════
// FUNDING PROGRESS
// ════════════════════════════════════════════════════════════════════════════

/// Display-ready funding summary for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingProgress {
    /// Progress of SUI raised vs goal, clamped to `[0, 100]`.
    pub percent: f64,
    /// Raw goal amount (SUI, 9 decimals).
    pub goal_amount: u64,
    /// Raw SUI raised.
    pub raised_sui: u64,
    /// Raw SGUSD raised.
    pub raised_sgusd: u64,
    /// Goal formatted as SUI.
    pub goal_display: String,
    /// SUI raised formatted.
    pub raised_sui_display: String,
    /// SGUSD raised formatted with SGUSD decimals.
    pub raised_sgusd_display: String,
    /// SUI raised reached the goal.
    pub funded: bool,
}

impl FundingProgress {
    /// Build a summary from possibly-missing on-chain fields.
    pub fn compute(goal: Option<u64>, raised_sui: Option<u64>, raised_sgusd: Option<u64>) -> Self {
        let goal_amount = goal.unwrap_or(0);
        let raised_sui = raised_sui.unwrap_or(0);
        let raised_sgusd = raised_sgusd.unwrap_or(0);

        Self {
            percent: progress_percent(goal_amount, raised_sui),
            goal_amount,
            raised_sui,
            raised_sgusd,
            goal_display: format_coin(goal_amount, CoinType::Sui),
            raised_sui_display: format_coin(raised_sui, CoinType::Sui),
            raised_sgusd_display: format_coin(raised_sgusd, CoinType::SgUsd),
            funded: goal_amount > 0 && raised_sui >= goal_amount,
        }
    }
}
