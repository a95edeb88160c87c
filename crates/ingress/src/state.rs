//! Shared handler state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use suigives_chain::{CampaignService, ChainMetrics, ChainRpc, ReadPipeline, SuiRpcClient};
use suigives_common::AppConfig;
use suigives_storage::{Database, Reconciler};

/// Application state for axum handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: Arc<CampaignService>,
    pub db: Arc<Database>,
    pub reconciler: Arc<Reconciler<CampaignService>>,
}

impl AppState {
    /// Wire state around an existing chain client and database.
    pub fn new(config: AppConfig, rpc: Arc<dyn ChainRpc>, db: Arc<Database>) -> Self {
        let metrics = Arc::new(ChainMetrics::new());
        let pipeline = ReadPipeline::from_config(&config, metrics);
        let service = Arc::new(CampaignService::from_config(&config, rpc, pipeline));
        let reconciler = Arc::new(Reconciler::from_config(
            &config.reconcile,
            service.clone(),
            db.clone(),
        ));
        Self { config: Arc::new(config), service, db, reconciler }
    }

    /// Full node client and database from configuration.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let url = config.rpc_url();
        let rpc = SuiRpcClient::new(
            url.clone(),
            Duration::from_millis(config.chain.request_timeout_ms),
        )
        .with_context(|| format!("creating RPC client for {}", url))?;
        let db = Database::open(&config.database_path)
            .with_context(|| format!("opening database {}", config.database_path.display()))?;
        Ok(Self::new(config, Arc::new(rpc), Arc::new(db)))
    }

    pub fn metrics(&self) -> &ChainMetrics {
        self.service.pipeline().metrics()
    }

    pub fn is_admin(&self, address: &str) -> bool {
        self.config.is_admin(address)
    }
}
