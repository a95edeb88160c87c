//! Proposal queries.
//!
//! Status changes go through [`Proposal::transition_at`]; the UPDATE is
//! guarded by the previous status so a concurrent review cannot be
//! overwritten silently.

use rusqlite::{params, Connection, OptionalExtension, Row};
use suigives_common::{Proposal, ProposalAction, ProposalStatus};
use tracing::info;

use super::{get_parsed, get_u64};
use crate::error::{to_sql_amount, DbError, Result};

const COLUMNS: &str = "id, creator, name, description, image_url, goal_amount, deadline_ms, \
                       category, status, campaign_id, admin_note, created_at_ms, updated_at_ms";

pub trait ProposalQueries {
    fn insert_proposal(&self, proposal: &Proposal) -> Result<()>;

    fn load_proposal(&self, id: &str) -> Result<Option<Proposal>>;

    /// Newest first, optionally filtered by status.
    fn list_proposals(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>>;

    /// Apply a review action and persist the result.
    fn update_proposal(&self, id: &str, action: ProposalAction, now_ms: u64) -> Result<Proposal>;
}

fn row_to_proposal(row: &Row<'_>) -> rusqlite::Result<Proposal> {
    Ok(Proposal {
        id: row.get(0)?,
        creator: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        image_url: row.get(4)?,
        goal_amount: get_u64(row, 5)?,
        deadline_ms: get_u64(row, 6)?,
        category: row.get(7)?,
        status: get_parsed(row, 8)?,
        campaign_id: row.get(9)?,
        admin_note: row.get(10)?,
        created_at_ms: get_u64(row, 11)?,
        updated_at_ms: get_u64(row, 12)?,
    })
}

impl ProposalQueries for Connection {
    fn insert_proposal(&self, p: &Proposal) -> Result<()> {
        self.execute(
            r#"
            INSERT INTO proposals (id, creator, name, description, image_url, goal_amount,
                                   deadline_ms, category, status, campaign_id, admin_note,
                                   created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                p.id,
                p.creator,
                p.name,
                p.description,
                p.image_url,
                to_sql_amount(p.goal_amount)?,
                to_sql_amount(p.deadline_ms)?,
                p.category,
                p.status.as_str(),
                p.campaign_id,
                p.admin_note,
                to_sql_amount(p.created_at_ms)?,
                to_sql_amount(p.updated_at_ms)?,
            ],
        )?;
        Ok(())
    }

    fn load_proposal(&self, id: &str) -> Result<Option<Proposal>> {
        Ok(self
            .query_row(
                &format!("SELECT {} FROM proposals WHERE id = ?1", COLUMNS),
                [id],
                row_to_proposal,
            )
            .optional()?)
    }

    fn list_proposals(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>> {
        let sql = format!(
            "SELECT {} FROM proposals WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at_ms DESC, id",
            COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map([status.map(ProposalStatus::as_str)], row_to_proposal)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update_proposal(&self, id: &str, action: ProposalAction, now_ms: u64) -> Result<Proposal> {
        let tx = self.unchecked_transaction()?;
        let mut proposal = tx
            .load_proposal(id)?
            .ok_or_else(|| DbError::NotFound(format!("proposal {}", id)))?;
        let from = proposal.status;
        let to = proposal.transition_at(action, now_ms)?;

        let changed = tx.execute(
            r#"
            UPDATE proposals
            SET status = ?1, campaign_id = ?2, admin_note = ?3, updated_at_ms = ?4
            WHERE id = ?5 AND status = ?6
            "#,
            params![
                to.as_str(),
                proposal.campaign_id,
                proposal.admin_note,
                to_sql_amount(proposal.updated_at_ms)?,
                id,
                from.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(DbError::Integrity(format!(
                "proposal {} changed status during review",
                id
            )));
        }
        tx.commit()?;

        info!(proposal_id = %id, from = %from, to = %to, "proposal reviewed");
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_connection;
    use suigives_common::{NewProposal, ProposalError};

    fn proposal(name: &str, created: u64) -> Proposal {
        NewProposal {
            creator: "0xab".into(),
            name: name.into(),
            description: String::new(),
            image_url: String::new(),
            goal_amount: 100,
            deadline_ms: 10_000,
            category: "health".into(),
        }
        .into_proposal(created)
        .unwrap()
    }

    #[test]
    fn test_insert_and_list_by_status() {
        let conn = test_connection();
        let a = proposal("a", 1);
        let b = proposal("b", 2);
        conn.insert_proposal(&a).unwrap();
        conn.insert_proposal(&b).unwrap();

        assert_eq!(conn.load_proposal(&a.id).unwrap(), Some(a.clone()));
        let all = conn.list_proposals(None).unwrap();
        assert_eq!(all[0].id, b.id);

        conn.update_proposal(&a.id, ProposalAction::Reject { note: None }, 5).unwrap();
        let pending = conn.list_proposals(Some(ProposalStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
        assert_eq!(conn.list_proposals(Some(ProposalStatus::Rejected)).unwrap().len(), 1);
    }

    #[test]
    fn test_approve_persists_campaign_id() {
        let conn = test_connection();
        let p = proposal("a", 1);
        conn.insert_proposal(&p).unwrap();

        let approved = conn
            .update_proposal(
                &p.id,
                ProposalAction::Approve { campaign_id: "0xBEEF".into(), note: Some("ok".into()) },
                7,
            )
            .unwrap();
        assert_eq!(approved.status, ProposalStatus::Approved);

        let stored = conn.load_proposal(&p.id).unwrap().unwrap();
        assert_eq!(stored.campaign_id.as_deref(), Some("0xbeef"));
        assert_eq!(stored.admin_note.as_deref(), Some("ok"));
        assert_eq!(stored.updated_at_ms, 7);
    }

    #[test]
    fn test_invalid_transition_leaves_row_untouched() {
        let conn = test_connection();
        let p = proposal("a", 1);
        conn.insert_proposal(&p).unwrap();
        conn.update_proposal(&p.id, ProposalAction::Reject { note: None }, 2).unwrap();

        let err = conn
            .update_proposal(&p.id, ProposalAction::Approve { campaign_id: "0x1".into(), note: None }, 3)
            .unwrap_err();
        assert!(matches!(err, DbError::Proposal(ProposalError::InvalidTransition { .. })));

        let stored = conn.load_proposal(&p.id).unwrap().unwrap();
        assert_eq!(stored.status, ProposalStatus::Rejected);
        assert!(stored.campaign_id.is_none());
    }

    #[test]
    fn test_update_missing_proposal() {
        let conn = test_connection();
        assert!(matches!(
            conn.update_proposal("nope", ProposalAction::Resubmit, 1),
            Err(DbError::NotFound(_))
        ));
    }
}
