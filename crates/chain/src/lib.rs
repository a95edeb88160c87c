//! # SuiGives Chain Read Path
//!
//! Read-only akses ke chain Sui untuk platform crowdfunding SuiGives.
//!
//! ## Module Overview
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `limiter` | Bounded concurrency untuk RPC read (FIFO) |
//! | `cache` | In-memory TTL cache, stale-on-failure |
//! | `retry` | Exponential backoff + jitter, linear delay untuk rate limit |
//! | `persisted` | File cache jangka panjang sebagai fallback terakhir |
//! | `freshness` | TTL dan invalidasi per domain |
//! | `pipeline` | Komposisi cache ∘ limiter ∘ retry ∘ rpc |
//! | `ledger` | Nilai raised optimistic sebelum konfirmasi chain |
//! | `rpc` | `ChainRpc` trait + client JSON-RPC Sui |
//! | `parse` | Parsing Move object dan event |
//! | `service` | `CampaignService`: campaign, event donasi, saldo |
//! | `mock` | `MockChainRpc` tanpa jaringan |
//! | `metrics` | Counter Prometheus |
//!
//! ## Prinsip
//!
//! - Chain adalah sumber kebenaran; semua lapisan lain hanya cache
//! - Kegagalan network/rate-limit tidak pernah fatal; read terdegradasi
//!   menjadi data lama atau `None`
//! - Tidak ada write ke chain di crate ini; transaksi ditandatangani dan
//!   dikirim oleh wallet user

pub mod cache;
pub mod error;
pub mod freshness;
pub mod ledger;
pub mod limiter;
pub mod metrics;
pub mod mock;
pub mod parse;
pub mod persisted;
pub mod pipeline;
pub mod retry;
pub mod rpc;
pub mod service;

pub use cache::{CacheKey, Lookup, ResponseCache};
pub use error::{ChainError, FailureClass};
pub use freshness::{CacheDomain, DomainState, FreshnessPolicy};
pub use ledger::{FundingLedger, RaisedAmount};
pub use limiter::RequestLimiter;
pub use metrics::ChainMetrics;
pub use mock::MockChainRpc;
pub use persisted::PersistedCache;
pub use pipeline::ReadPipeline;
pub use retry::RetryPolicy;
pub use rpc::{ChainRpc, EventCursor, EventPage, SuiRpcClient};
pub use service::{CampaignService, CampaignView};
