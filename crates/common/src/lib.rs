//! # SuiGives Common Crate
//!
//! Tipe domain bersama untuk semua crate SuiGives.
//!
//! ## Modules
//! - `coin`: SUI / SGUSD coin types and decimals
//! - `amount`: fixed-point formatting and funding progress
//! - `model`: Campaign, Donation, UserProfile
//! - `proposal`: proposal review state machine
//! - `config`: TOML configuration with env overrides

pub mod amount;
pub mod coin;
pub mod config;
pub mod model;
pub mod proposal;

pub use amount::{format_amount, format_coin, parse_amount, progress_percent, AmountError, FundingProgress};
pub use coin::CoinType;
pub use config::{AppConfig, ConfigError, Network};
pub use model::{
    current_timestamp_ms, normalize_address, Campaign, Donation, DonationAggregates, DonationEvent,
    ProfileFields, UserProfile,
};
pub use proposal::{NewProposal, Proposal, ProposalAction, ProposalError, ProposalStatus};
