//! Admin routes, mounted behind [`crate::auth::admin_guard`].

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use suigives_common::{
    current_timestamp_ms, Donation, NewProposal, Proposal, ProposalAction, ProposalStatus,
    UserProfile,
};
use suigives_storage::{
    DonationQueries, ImportOutcome, ProposalQueries, ReconcileReport, UserQueries,
};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::public::submit;
use crate::state::AppState;

/// Upper bound for `limit` on list endpoints.
pub const MAX_LIST_LIMIT: usize = 1_000;
const DEFAULT_LIST_LIMIT: usize = 100;

// ════════════════════════════════════════════════════════════════════════════
// USERS
// ════════════════════════════════════════════════════════════════════════════

/// GET /api/admin/users
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>, ApiError> {
    Ok(Json(state.db.with_connection(|c| c.list_users())?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecomputeRequest {
    pub address: Option<String>,
}

/// POST /api/admin/users
///
/// Recompute aggregates for one address, or for every donor when the body
/// names none.
#[instrument(skip(state))]
pub async fn recompute_users(
    State(state): State<AppState>,
    body: Option<Json<RecomputeRequest>>,
) -> Result<Json<Value>, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let response = match request.address.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(address) => {
            let aggregates = state.db.with_connection(|c| c.recompute_user_aggregates(address))?;
            json!({ "recomputed": 1, "aggregates": aggregates })
        }
        None => {
            let n = state.db.with_connection(|c| c.recompute_all_aggregates())?;
            json!({ "recomputed": n })
        }
    };
    Ok(Json(response))
}

// ════════════════════════════════════════════════════════════════════════════
// DONATIONS
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationFilter {
    pub campaign_id: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/admin/donations
#[instrument(skip(state))]
pub async fn list_donations(
    State(state): State<AppState>,
    Query(filter): Query<DonationFilter>,
) -> Result<Json<Vec<Donation>>, ApiError> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let campaign = filter
        .campaign_id
        .as_deref()
        .map(|id| suigives_common::normalize_address(id).unwrap_or_else(|| id.to_string()));
    Ok(Json(state.db.with_connection(|c| c.list_donations(campaign.as_deref(), limit))?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub inserted: bool,
    pub tx_digest: String,
}

/// POST /api/admin/donations
///
/// 201 when the record is new, 200 when the digest was already stored.
#[instrument(skip(state, donation), fields(tx_digest = %donation.tx_digest))]
pub async fn import_donation(
    State(state): State<AppState>,
    Json(donation): Json<Donation>,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    let outcome = state.db.with_connection(|c| c.import_donation(&donation))?;
    let inserted = outcome == ImportOutcome::Inserted;
    let status = if inserted { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(ImportResponse { inserted, tx_digest: donation.tx_digest })))
}

// ════════════════════════════════════════════════════════════════════════════
// PROPOSALS
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct ProposalFilter {
    pub status: Option<String>,
}

/// GET /api/admin/proposals
#[instrument(skip(state))]
pub async fn list_proposals(
    State(state): State<AppState>,
    Query(filter): Query<ProposalFilter>,
) -> Result<Json<Vec<Proposal>>, ApiError> {
    let status = filter
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<ProposalStatus>)
        .transpose()?;
    Ok(Json(state.db.with_connection(|c| c.list_proposals(status))?))
}

/// POST /api/admin/proposals
#[instrument(skip(state, body))]
pub async fn create_proposal(
    State(state): State<AppState>,
    Json(body): Json<NewProposal>,
) -> Result<(StatusCode, Json<Proposal>), ApiError> {
    let proposal = submit(&state, body)?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub id: String,
    /// `approve`, `reject`, `requestRevision` or `resubmit`.
    pub action: String,
    pub campaign_id: Option<String>,
    pub note: Option<String>,
}

impl ReviewRequest {
    fn into_action(self) -> Result<(String, ProposalAction), ApiError> {
        let action = match self.action.as_str() {
            "approve" => ProposalAction::Approve {
                campaign_id: self.campaign_id.unwrap_or_default(),
                note: self.note,
            },
            "reject" => ProposalAction::Reject { note: self.note },
            "requestRevision" | "request_revision" => {
                ProposalAction::RequestRevision { note: self.note }
            }
            "resubmit" => ProposalAction::Resubmit,
            other => return Err(ApiError::BadRequest(format!("unknown action: {}", other))),
        };
        Ok((self.id, action))
    }
}

/// PATCH /api/admin/proposals
#[instrument(skip(state, body), fields(proposal_id = %body.id, action = %body.action))]
pub async fn review_proposal(
    State(state): State<AppState>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Proposal>, ApiError> {
    let (id, action) = body.into_action()?;
    let proposal = state
        .db
        .with_connection(|c| c.update_proposal(&id, action, current_timestamp_ms()))?;
    Ok(Json(proposal))
}

// ════════════════════════════════════════════════════════════════════════════
// RECONCILIATION
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/admin/reconcile
#[instrument(skip(state))]
pub async fn reconcile(State(state): State<AppState>) -> Json<ReconcileReport> {
    let report = state.reconciler.run().await;
    info!(imported = report.donations_imported, complete = report.complete, "manual reconciliation");
    Json(report)
}
