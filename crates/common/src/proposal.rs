//! # Campaign Proposals
//!
//! Proposal adalah permintaan membuat campaign yang direview admin.
//!
//! ## State Machine
//!
//! ```text
//!            ┌──────────► APPROVED  (campaign_id wajib, terminal)
//!            │
//! PENDING ───┼──────────► REJECTED  (campaign_id selalu None, terminal)
//!    ▲       │
//!    │       └──────────► REVISION_REQUESTED
//!    │                          │
//!    └────────── resubmit ──────┘
//! ```
//!
//! Approve hanya sah jika transaksi pembuatan campaign sudah tersubmit;
//! id campaign hasil transaksi itu dicatat pada proposal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{current_timestamp_ms, normalize_address};

/// Review status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    RevisionRequested,
}

impl ProposalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::Approved => "APPROVED",
            ProposalStatus::Rejected => "REJECTED",
            ProposalStatus::RevisionRequested => "REVISION_REQUESTED",
        }
    }

    /// No further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProposalStatus::Approved | ProposalStatus::Rejected)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ProposalStatus::Pending),
            "APPROVED" => Ok(ProposalStatus::Approved),
            "REJECTED" => Ok(ProposalStatus::Rejected),
            "REVISION_REQUESTED" => Ok(ProposalStatus::RevisionRequested),
            other => Err(ProposalError::UnknownStatus(other.to_string())),
        }
    }
}

/// Admin or creator action on a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ProposalAction {
    /// Campaign-creation transaction was submitted; record its object id.
    #[serde(rename_all = "camelCase")]
    Approve { campaign_id: String, note: Option<String> },
    Reject { note: Option<String> },
    RequestRevision { note: Option<String> },
    /// Creator re-enters review after revising.
    Resubmit,
}

/// Errors from proposal validation and transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProposalError {
    #[error("invalid transition from {from} via {action}")]
    InvalidTransition { from: ProposalStatus, action: &'static str },
    #[error("approval requires a campaign id")]
    MissingCampaignId,
    #[error("unknown proposal status: {0}")]
    UnknownStatus(String),
    #[error("invalid proposal: {0}")]
    Invalid(String),
}

/// Fields submitted by a campaign creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProposal {
    pub creator: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    /// Goal in SUI smallest units.
    pub goal_amount: u64,
    pub deadline_ms: u64,
    #[serde(default)]
    pub category: String,
}

impl NewProposal {
    /// Validate and turn into a `Pending` proposal.
    pub fn into_proposal(self, now_ms: u64) -> Result<Proposal, ProposalError> {
        let creator = normalize_address(&self.creator)
            .ok_or_else(|| ProposalError::Invalid(format!("bad creator address: {}", self.creator)))?;
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ProposalError::Invalid("name is required".into()));
        }
        if self.goal_amount == 0 {
            return Err(ProposalError::Invalid("goal must be positive".into()));
        }
        if self.deadline_ms <= now_ms {
            return Err(ProposalError::Invalid("deadline must be in the future".into()));
        }

        Ok(Proposal {
            id: Uuid::new_v4().to_string(),
            creator,
            name,
            description: self.description,
            image_url: self.image_url,
            goal_amount: self.goal_amount,
            deadline_ms: self.deadline_ms,
            category: self.category.trim().to_ascii_lowercase(),
            status: ProposalStatus::Pending,
            campaign_id: None,
            admin_note: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }
}

/// A campaign proposal under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub creator: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub goal_amount: u64,
    pub deadline_ms: u64,
    pub category: String,
    pub status: ProposalStatus,
    pub campaign_id: Option<String>,
    pub admin_note: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Proposal {
    /// Apply an action, enforcing the state machine.
    ///
    /// On error the proposal is left untouched.
    pub fn transition(&mut self, action: ProposalAction) -> Result<ProposalStatus, ProposalError> {
        self.transition_at(action, current_timestamp_ms())
    }

    pub fn transition_at(
        &mut self,
        action: ProposalAction,
        now_ms: u64,
    ) -> Result<ProposalStatus, ProposalError> {
        let from = self.status;
        match (from, action) {
            (ProposalStatus::Pending, ProposalAction::Approve { campaign_id, note }) => {
                let campaign_id =
                    normalize_address(&campaign_id).ok_or(ProposalError::MissingCampaignId)?;
                self.status = ProposalStatus::Approved;
                self.campaign_id = Some(campaign_id);
                if note.is_some() {
                    self.admin_note = note;
                }
            }
            (ProposalStatus::Pending, ProposalAction::Reject { note }) => {
                self.status = ProposalStatus::Rejected;
                self.campaign_id = None;
                self.admin_note = note;
            }
            (ProposalStatus::Pending, ProposalAction::RequestRevision { note }) => {
                self.status = ProposalStatus::RevisionRequested;
                self.admin_note = note;
            }
            (ProposalStatus::RevisionRequested, ProposalAction::Resubmit) => {
                self.status = ProposalStatus::Pending;
            }
            (from, action) => {
                return Err(ProposalError::InvalidTransition {
                    from,
                    action: action_name(&action),
                });
            }
        }
        self.updated_at_ms = now_ms;
        Ok(self.status)
    }
}

fn action_name(action: &ProposalAction) -> &'static str {
    match action {
        ProposalAction::Approve { .. } => "approve",
        ProposalAction::Reject { .. } => "reject",
        ProposalAction::RequestRevision { .. } => "requestRevision",
        ProposalAction::Resubmit => "resubmit",
    }
}
