//! Donation queries.
//!
//! Import is idempotent on `tx_digest`: replaying the same event stream
//! never creates a second record or double counts an aggregate.

use rusqlite::{params, Connection, OptionalExtension, Row};
use suigives_common::Donation;
use tracing::debug;

use super::users::UserQueries;
use super::{get_parsed, get_u64};
use crate::error::{to_sql_amount, DbError, Result};

/// Result of [`DonationQueries::import_donation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Inserted,
    /// A record with the same transaction digest already existed.
    Duplicate,
}

const COLUMNS: &str =
    "tx_digest, campaign_id, donor, amount, coin_type, message, is_anonymous, timestamp_ms";

pub trait DonationQueries {
    /// Store a confirmed donation and recompute the donor's aggregates, in
    /// one transaction.
    fn import_donation(&self, donation: &Donation) -> Result<ImportOutcome>;

    fn load_donation(&self, tx_digest: &str) -> Result<Option<Donation>>;

    /// Newest first.
    fn list_donations(&self, campaign_id: Option<&str>, limit: usize) -> Result<Vec<Donation>>;

    /// Newest first.
    fn donations_by_donor(&self, donor: &str) -> Result<Vec<Donation>>;
}

fn row_to_donation(row: &Row<'_>) -> rusqlite::Result<Donation> {
    Ok(Donation {
        tx_digest: row.get(0)?,
        campaign_id: row.get(1)?,
        donor: row.get(2)?,
        amount: get_u64(row, 3)?,
        coin_type: get_parsed(row, 4)?,
        message: row.get(5)?,
        is_anonymous: row.get(6)?,
        timestamp_ms: get_u64(row, 7)?,
    })
}

impl DonationQueries for Connection {
    fn import_donation(&self, donation: &Donation) -> Result<ImportOutcome> {
        let d = donation.clone().normalized();
        if d.tx_digest.trim().is_empty() {
            return Err(DbError::Invalid("donation without transaction digest".into()));
        }

        let tx = self.unchecked_transaction()?;
        let inserted = tx.execute(
            r#"
            INSERT OR IGNORE INTO donations (tx_digest, campaign_id, donor, amount, coin_type,
                                             message, is_anonymous, timestamp_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                d.tx_digest,
                d.campaign_id,
                d.donor,
                to_sql_amount(d.amount)?,
                d.coin_type.as_str(),
                d.message,
                d.is_anonymous,
                to_sql_amount(d.timestamp_ms)?,
            ],
        )?;

        if inserted == 0 {
            debug!(tx_digest = %d.tx_digest, "duplicate donation ignored");
            return Ok(ImportOutcome::Duplicate);
        }

        if let Some(donor) = &d.donor {
            tx.recompute_user_aggregates(donor)?;
        }
        tx.commit()?;
        debug!(tx_digest = %d.tx_digest, campaign_id = %d.campaign_id, "donation imported");
        Ok(ImportOutcome::Inserted)
    }

    fn load_donation(&self, tx_digest: &str) -> Result<Option<Donation>> {
        Ok(self
            .query_row(
                &format!("SELECT {} FROM donations WHERE tx_digest = ?1", COLUMNS),
                [tx_digest],
                row_to_donation,
            )
            .optional()?)
    }

    fn list_donations(&self, campaign_id: Option<&str>, limit: usize) -> Result<Vec<Donation>> {
        let sql = format!(
            "SELECT {} FROM donations WHERE (?1 IS NULL OR campaign_id = ?1) \
             ORDER BY timestamp_ms DESC, tx_digest LIMIT ?2",
            COLUMNS
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map(params![campaign_id, limit], row_to_donation)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn donations_by_donor(&self, donor: &str) -> Result<Vec<Donation>> {
        let sql = format!(
            "SELECT {} FROM donations WHERE donor = ?1 ORDER BY timestamp_ms DESC, tx_digest",
            COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map([donor], row_to_donation)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
