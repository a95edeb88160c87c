//! Routes open to any wallet: proposal submission and user profiles.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use suigives_common::{current_timestamp_ms, NewProposal, ProfileFields, Proposal, UserProfile};
use suigives_storage::{ProposalQueries, UserQueries};
use tracing::{info, instrument};

use crate::auth::{require_owner, wallet_address};
use crate::error::ApiError;
use crate::state::AppState;

/// Validate and store a new `Pending` proposal.
pub(crate) fn submit(state: &AppState, new: NewProposal) -> Result<Proposal, ApiError> {
    let proposal = new.into_proposal(current_timestamp_ms())?;
    state.db.with_connection(|c| c.insert_proposal(&proposal))?;
    info!(proposal_id = %proposal.id, creator = %proposal.creator, "proposal submitted");
    Ok(proposal)
}

/// POST /api/proposals
#[instrument(skip(state, headers, body))]
pub async fn submit_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewProposal>,
) -> Result<(StatusCode, Json<Proposal>), ApiError> {
    // A connected wallet may only submit in its own name.
    if let Some(wallet) = wallet_address(&headers) {
        if suigives_common::normalize_address(&body.creator).as_deref() != Some(wallet.as_str()) {
            return Err(ApiError::Forbidden("wallet does not match proposal creator"));
        }
    }
    let proposal = submit(&state, body)?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub address: String,
}

/// GET /api/user/profile
///
/// The owner sees everything; other viewers get the public view.
#[instrument(skip(state, headers))]
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .db
        .with_connection(|c| c.load_user(&query.address))?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", query.address)))?;

    let is_owner = wallet_address(&headers).as_deref() == Some(user.address.as_str());
    Ok(Json(if is_owner { user } else { user.public_view() }))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub address: String,
    #[serde(flatten)]
    pub fields: ProfileFields,
}

/// POST /api/user/profile
#[instrument(skip(state, headers, body), fields(address = %body.address))]
pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let owner = require_owner(&headers, &body.address)?;
    let user = state
        .db
        .with_connection(|c| c.upsert_profile(&owner, &body.fields, current_timestamp_ms()))?;
    info!(address = %owner, "profile updated");
    Ok(Json(user))
}
