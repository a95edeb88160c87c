//! Config loader using TOML and serde, with environment overrides.
//!
//! Every field has a default so an empty file (or no file) yields a
//! runnable testnet configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::normalize_address;

/// Errors while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

/// Sui network the service points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

impl Network {
    /// Public full node for the network.
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::Testnet => "https://fullnode.testnet.sui.io:443",
            Network::Mainnet => "https://fullnode.mainnet.sui.io:443",
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(ConfigError::Invalid { field: "network", value: other.to_string() }),
        }
    }
}

/// Chain read path settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Override for the full node URL.
    pub rpc_url: Option<String>,
    /// Maximum concurrent RPC reads.
    pub max_concurrent_requests: usize,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub base_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub retry_jitter_ms: u64,
    /// Directory of the long-lived fallback cache. `None` disables it.
    pub persisted_cache_dir: Option<PathBuf>,
    pub persisted_cache_max_age_secs: u64,
    /// Move module holding campaign types and events.
    pub module_name: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            max_concurrent_requests: 3,
            request_timeout_ms: 10_000,
            max_retries: 3,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 8_000,
            rate_limit_delay_ms: 2_000,
            retry_jitter_ms: 250,
            persisted_cache_dir: Some(PathBuf::from("./data/chain-cache")),
            persisted_cache_max_age_secs: 30 * 60,
            module_name: "crowdfunding".to_string(),
        }
    }
}

/// TTLs of the in-memory response cache, per domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub campaign_list_ttl_secs: u64,
    pub campaign_detail_ttl_secs: u64,
    pub token_balance_ttl_secs: u64,
    pub donation_events_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            campaign_list_ttl_secs: 5 * 60,
            campaign_detail_ttl_secs: 2 * 60,
            token_balance_ttl_secs: 30,
            donation_events_ttl_secs: 60,
        }
    }
}

/// Background chain → database reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Seconds between runs; 0 disables the background loop.
    pub interval_secs: u64,
    pub page_size: usize,
    /// Upper bound on pages per run.
    pub max_pages: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { interval_secs: 120, page_size: 50, max_pages: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error. `RUST_LOG` wins when set.
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "text".to_string() }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: Network,
    /// Published package id of the crowdfunding contract.
    pub package_id: String,
    pub database_path: PathBuf,
    pub bind_addr: String,
    /// Wallet addresses allowed on admin routes.
    pub admin_addresses: Vec<String>,
    pub chain: ChainConfig,
    pub cache: CacheConfig,
    pub reconcile: ReconcileConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            package_id: "0x0".to_string(),
            database_path: PathBuf::from("./data/suigives.db"),
            bind_addr: "127.0.0.1:8088".to_string(),
            admin_addresses: Vec::new(),
            chain: ChainConfig::default(),
            cache: CacheConfig::default(),
            reconcile: ReconcileConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.validated()
    }

    /// Effective full node URL.
    pub fn rpc_url(&self) -> String {
        self.chain
            .rpc_url
            .clone()
            .unwrap_or_else(|| self.network.default_rpc_url().to_string())
    }

    /// Whether `address` is on the admin allow-list.
    pub fn is_admin(&self, address: &str) -> bool {
        match normalize_address(address) {
            Some(addr) => self.admin_addresses.iter().any(|a| *a == addr),
            None => false,
        }
    }

    /// Apply `SUIGIVES_*` overrides from an environment lookup.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SUIGIVES_NETWORK") {
            self.network = v.parse()?;
        }
        if let Some(v) = lookup("SUIGIVES_RPC_URL") {
            self.chain.rpc_url = Some(v);
        }
        if let Some(v) = lookup("SUIGIVES_PACKAGE_ID") {
            self.package_id = v;
        }
        if let Some(v) = lookup("SUIGIVES_DATABASE") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SUIGIVES_BIND") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("SUIGIVES_ADMINS") {
            self.admin_addresses = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        self.validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        let mut admins = Vec::with_capacity(self.admin_addresses.len());
        for raw in &self.admin_addresses {
            let addr = normalize_address(raw).ok_or_else(|| ConfigError::Invalid {
                field: "admin_addresses",
                value: raw.clone(),
            })?;
            admins.push(addr);
        }
        self.admin_addresses = admins;
        self.package_id = normalize_address(&self.package_id).ok_or_else(|| ConfigError::Invalid {
            field: "package_id",
            value: self.package_id.clone(),
        })?;
        if self.chain.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                field: "chain.max_concurrent_requests",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }
}

/// Load config from a TOML file, then apply process environment overrides.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let p = path.as_ref();
    let s = fs::read_to_string(p).map_err(|source| ConfigError::Io {
        path: p.to_path_buf(),
        source,
    })?;
    AppConfig::from_toml_str(&s)?.apply_env(|k| std::env::var(k).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let def = AppConfig::default().validated().unwrap();
        assert_eq!(def.network, Network::Testnet);
        assert_eq!(def.chain.max_concurrent_requests, 3);
        assert_eq!(def.chain.persisted_cache_max_age_secs, 1800);
        assert_eq!(def.rpc_url(), "https://fullnode.testnet.sui.io:443");
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        use std::io::Write;
        let tmp = tempfile::NamedTempFile::new().expect("temp file");
        let toml = r#"
            network = "mainnet"
            package_id = "0xABC"
            admin_addresses = ["0xAA", "0xbb"]

            [chain]
            max_concurrent_requests = 5

            [cache]
            token_balance_ttl_secs = 10
        "#;
        let mut f = tmp.reopen().expect("reopen");
        write!(f, "{}", toml).expect("write");
        let cfg = load_from_file(tmp.path()).expect("load");
        assert_eq!(cfg.network, Network::Mainnet);
        assert_eq!(cfg.package_id, "0xabc");
        assert_eq!(cfg.chain.max_concurrent_requests, 5);
        assert_eq!(cfg.cache.token_balance_ttl_secs, 10);
        assert_eq!(cfg.cache.campaign_list_ttl_secs, 300);
        assert!(cfg.is_admin("0xAA"));
        assert!(cfg.is_admin("0xbb"));
        assert!(!cfg.is_admin("0xcc"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SUIGIVES_NETWORK", "mainnet"),
            ("SUIGIVES_RPC_URL", "http://localhost:9000"),
            ("SUIGIVES_ADMINS", "0x1, 0x2,"),
        ]
        .into_iter()
        .collect();
        let cfg = AppConfig::default()
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.network, Network::Mainnet);
        assert_eq!(cfg.rpc_url(), "http://localhost:9000");
        assert_eq!(cfg.admin_addresses, vec!["0x1".to_string(), "0x2".to_string()]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_toml_str(r#"admin_addresses = ["not-hex"]"#).is_err());
        assert!(AppConfig::from_toml_str("[chain]\nmax_concurrent_requests = 0").is_err());
        assert!(AppConfig::default().apply_env(|k| (k == "SUIGIVES_NETWORK").then(|| "devnet".into())).is_err());
    }
}
