//! Campaign mirror queries.
//!
//! The chain is authoritative: `upsert_campaign` overwrites every column.

use rusqlite::{params, Connection, OptionalExtension, Row};
use suigives_common::Campaign;

use super::get_u64;
use crate::error::{to_sql_amount, Result};

const COLUMNS: &str = "id, name, description, image_url, goal_amount, raised_sui, raised_sgusd, \
                       deadline_ms, category, creator, backer_count, created_at_ms, is_active, ended";

pub trait CampaignQueries {
    /// Insert or overwrite a campaign with the chain's values.
    fn upsert_campaign(&self, campaign: &Campaign, synced_at_ms: u64) -> Result<()>;

    fn load_campaign(&self, id: &str) -> Result<Option<Campaign>>;

    /// Campaigns, newest first, optionally filtered by category
    /// (case-insensitive).
    fn list_campaigns(&self, category: Option<&str>) -> Result<Vec<Campaign>>;

    /// Mark every campaign whose deadline passed as ended.
    fn mark_expired(&self, now_ms: u64) -> Result<usize>;
}

fn row_to_campaign(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        image_url: row.get(3)?,
        goal_amount: get_u64(row, 4)?,
        raised_sui: get_u64(row, 5)?,
        raised_sgusd: get_u64(row, 6)?,
        deadline_ms: get_u64(row, 7)?,
        category: row.get(8)?,
        creator: row.get(9)?,
        backer_count: get_u64(row, 10)?,
        created_at_ms: get_u64(row, 11)?,
        is_active: row.get(12)?,
        ended: row.get(13)?,
    })
}

impl CampaignQueries for Connection {
    fn upsert_campaign(&self, c: &Campaign, synced_at_ms: u64) -> Result<()> {
        self.execute(
            r#"
            INSERT INTO campaigns (id, name, description, image_url, goal_amount, raised_sui,
                                   raised_sgusd, deadline_ms, category, creator, backer_count,
                                   created_at_ms, is_active, ended, synced_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                image_url = excluded.image_url,
                goal_amount = excluded.goal_amount,
                raised_sui = excluded.raised_sui,
                raised_sgusd = excluded.raised_sgusd,
                deadline_ms = excluded.deadline_ms,
                category = excluded.category,
                creator = excluded.creator,
                backer_count = excluded.backer_count,
                created_at_ms = excluded.created_at_ms,
                is_active = excluded.is_active,
                ended = excluded.ended OR campaigns.ended,
                synced_at_ms = excluded.synced_at_ms
            "#,
            params![
                c.id,
                c.name,
                c.description,
                c.image_url,
                to_sql_amount(c.goal_amount)?,
                to_sql_amount(c.raised_sui)?,
                to_sql_amount(c.raised_sgusd)?,
                to_sql_amount(c.deadline_ms)?,
                c.category.to_ascii_lowercase(),
                c.creator,
                to_sql_amount(c.backer_count)?,
                to_sql_amount(c.created_at_ms)?,
                c.is_active,
                c.ended,
                to_sql_amount(synced_at_ms)?,
            ],
        )?;
        Ok(())
    }

    fn load_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self
            .query_row(
                &format!("SELECT {} FROM campaigns WHERE id = ?1", COLUMNS),
                [id],
                row_to_campaign,
            )
            .optional()?)
    }

    fn list_campaigns(&self, category: Option<&str>) -> Result<Vec<Campaign>> {
        let sql = format!(
            "SELECT {} FROM campaigns WHERE (?1 IS NULL OR category = lower(?1)) \
             ORDER BY created_at_ms DESC, id",
            COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map([category], row_to_campaign)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn mark_expired(&self, now_ms: u64) -> Result<usize> {
        Ok(self.execute(
            "UPDATE campaigns SET ended = 1 WHERE ended = 0 AND deadline_ms > 0 AND deadline_ms <= ?1",
            [to_sql_amount(now_ms)?],
        )?)
    }
}
