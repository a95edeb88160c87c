//! Health and metrics endpoints.

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use suigives_storage::StateQueries;
use suigives_storage::schema::STATE_LAST_RECONCILE;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub database_ok: bool,
    /// Unix ms of the last finished reconciliation, if any.
    pub last_reconcile_ms: Option<u64>,
    pub rpc_calls: u64,
    pub cache_hits: u64,
    pub cache_stale_served: u64,
    pub persisted_fallbacks: u64,
    pub degraded_reads: u64,
    /// Campaigns showing donations the chain has not confirmed yet.
    pub optimistic_campaigns: usize,
    pub limiter_in_flight: usize,
    pub limiter_capacity: usize,
}

impl AppState {
    pub fn gather_health(&self) -> Health {
        let last = self.db.with_connection(|c| c.get_state(STATE_LAST_RECONCILE));
        let (database_ok, last_reconcile_ms) = match last {
            Ok(v) => (true, v.and_then(|s| s.parse().ok())),
            Err(e) => {
                warn!(error = %e, "database health check failed");
                (false, None)
            }
        };
        let metrics = self.metrics();
        let limiter = self.service.pipeline().limiter();
        Health {
            database_ok,
            last_reconcile_ms,
            rpc_calls: metrics.rpc_calls.get(),
            cache_hits: metrics.cache_hits.get(),
            cache_stale_served: metrics.cache_stale_served.get(),
            persisted_fallbacks: metrics.persisted_fallbacks.get(),
            degraded_reads: metrics.degraded_reads.get(),
            optimistic_campaigns: self.service.ledger().pending_campaigns().len(),
            limiter_in_flight: limiter.in_flight(),
            limiter_capacity: limiter.capacity(),
        }
    }
}

/// GET /health
///
/// 200 while the database answers; chain trouble shows in the counters but
/// does not fail the check.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.gather_health();
    let status = if health.database_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(health))
}

/// GET /metrics
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let output = state.metrics().to_prometheus();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    (StatusCode::OK, headers, output)
}
