//! Campaign read routes and the optimistic donation hook.
//!
//! Reads go through the chain read path. When it degrades to nothing, the
//! SQLite mirror answers instead so the page still renders.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use suigives_chain::CampaignView;
use suigives_common::{current_timestamp_ms, format_coin, parse_amount, CoinType};
use suigives_storage::{AnalyticsQueries, CampaignQueries};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CampaignFilter {
    pub category: Option<String>,
}

/// GET /api/campaigns
#[instrument(skip(state))]
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(filter): Query<CampaignFilter>,
) -> Result<Json<Vec<CampaignView>>, ApiError> {
    let category = filter.category.as_deref().filter(|c| !c.trim().is_empty());
    if let Some(views) = state.service.list_views(category).await? {
        return Ok(Json(views));
    }

    info!("chain unavailable, serving campaigns from mirror");
    let stored = state.db.with_connection(|c| c.list_campaigns(category))?;
    Ok(Json(stored.into_iter().map(|c| state.service.view_of(c)).collect()))
}

/// GET /api/campaigns/:id
#[instrument(skip(state))]
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignView>, ApiError> {
    if let Some(view) = state.service.campaign_view(&id).await? {
        return Ok(Json(view));
    }
    let stored = match suigives_common::normalize_address(&id) {
        Some(id) => state.db.with_connection(|c| c.load_campaign(&id))?,
        None => None,
    };
    stored
        .map(|c| Json(state.service.view_of(c)))
        .ok_or(ApiError::NotFound(format!("campaign {}", id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDonation {
    pub coin_type: CoinType,
    /// Human-readable amount, e.g. `"1.5"`.
    pub amount: String,
    #[serde(default)]
    pub tx_digest: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDonationAck {
    pub campaign_id: String,
    pub coin_type: CoinType,
    pub amount: u64,
    /// Displayed raised total for the coin, pending amounts included.
    pub displayed: u64,
    pub displayed_formatted: String,
}

/// POST /api/campaigns/:id/pending-donation
///
/// Called after the wallet reports a submitted donation transaction.
#[instrument(skip(state, body), fields(coin = %body.coin_type))]
pub async fn pending_donation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PendingDonation>,
) -> Result<Json<PendingDonationAck>, ApiError> {
    let campaign_id = suigives_common::normalize_address(&id)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid campaign id: {}", id)))?;
    let amount = parse_amount(&body.amount, body.coin_type.decimals())?;
    if amount == 0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    let ledger_state = state
        .service
        .record_donation_submitted(&campaign_id, body.coin_type, amount)
        .await?;
    // Chain unreachable with nothing cached: the mirror holds the last base.
    let displayed = match ledger_state.total() {
        Some(total) => total,
        None => {
            let base = state
                .db
                .with_connection(|c| c.load_campaign(&campaign_id))?
                .map_or(0, |c| c.raised(body.coin_type));
            ledger_state.displayed_over(base)
        }
    };
    info!(
        campaign_id = %campaign_id,
        amount,
        tx_digest = body.tx_digest.as_deref().unwrap_or("-"),
        "pending donation recorded"
    );

    Ok(Json(PendingDonationAck {
        campaign_id,
        coin_type: body.coin_type,
        amount,
        displayed,
        displayed_formatted: format_coin(displayed, body.coin_type),
    }))
}

/// GET /api/analytics
#[instrument(skip(state))]
pub async fn analytics(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let now = current_timestamp_ms();
    let (platform, categories) = state
        .db
        .with_connection(|c| Ok((c.platform_stats(now)?, c.category_breakdown()?)))?;
    Ok(Json(json!({ "platform": platform, "categories": categories })))
}
