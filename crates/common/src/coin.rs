//! # Coin Types
//!
//! Dua token yang diterima campaign SuiGives.
//!
//! | Coin | Decimals | Counts toward goal |
//! |------|----------|--------------------|
//! | SUI | 9 | yes |
//! | SGUSD | 6 | no (tracked only) |
//!
//! Hanya SUI yang dihitung untuk status "funded". SGUSD tetap dicatat
//! per campaign tetapi tidak pernah dibandingkan dengan goal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Token yang dapat didonasikan ke campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoinType {
    /// Native SUI, 9 decimals. Counts toward funded status.
    Sui,
    /// SuiGives USD stablecoin, 6 decimals.
    #[serde(rename = "SGUSD")]
    SgUsd,
}

impl CoinType {
    /// All supported coins, SUI first.
    pub const ALL: [CoinType; 2] = [CoinType::Sui, CoinType::SgUsd];

    /// Number of implied decimal places in the on-chain integer amount.
    pub fn decimals(self) -> u32 {
        match self {
            CoinType::Sui => 9,
            CoinType::SgUsd => 6,
        }
    }

    /// Whether amounts in this coin count toward the campaign goal.
    pub fn counts_toward_goal(self) -> bool {
        matches!(self, CoinType::Sui)
    }

    /// Short ticker used in the API and the database.
    pub fn as_str(self) -> &'static str {
        match self {
            CoinType::Sui => "SUI",
            CoinType::SgUsd => "SGUSD",
        }
    }

    /// Move type tag of the coin, given the package that publishes SGUSD.
    pub fn type_tag(self, package_id: &str) -> String {
        match self {
            CoinType::Sui => "0x2::sui::SUI".to_string(),
            CoinType::SgUsd => format!("{}::sg_usd::SG_USD", package_id),
        }
    }

    /// Resolve a coin from a full Move type tag (`0x2::sui::SUI`,
    /// `0xabc::sg_usd::SG_USD`). Generic wrappers like `Coin<...>` are
    /// accepted as long as the innermost struct name matches.
    pub fn from_type_tag(tag: &str) -> Option<CoinType> {
        let inner = tag.trim().trim_end_matches('>');
        let name = inner.rsplit("::").next()?;
        match name.to_ascii_uppercase().as_str() {
            "SUI" => Some(CoinType::Sui),
            "SG_USD" | "SGUSD" => Some(CoinType::SgUsd),
            _ => None,
        }
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown coin tickers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown coin type: {0}")]
pub struct UnknownCoin(pub String);

impl FromStr for CoinType {
    type Err = UnknownCoin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUI" => Ok(CoinType::Sui),
            "SGUSD" | "SG_USD" => Ok(CoinType::SgUsd),
            _ => CoinType::from_type_tag(s).ok_or_else(|| UnknownCoin(s.to_string())),
        }
    }
}
