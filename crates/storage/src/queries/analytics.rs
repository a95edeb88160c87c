//! Platform-wide statistics computed from the mirror.

use rusqlite::Connection;
use serde::Serialize;
use suigives_common::{format_coin, CoinType};

use super::get_u64;
use crate::error::{to_sql_amount, Result};

/// Totals served by the analytics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_campaigns: u64,
    pub active_campaigns: u64,
    /// Campaigns whose SUI raised reached the goal.
    pub funded_campaigns: u64,
    pub total_donations: u64,
    /// Distinct non-anonymous donors.
    pub unique_donors: u64,
    pub raised_sui: u64,
    pub raised_sgusd: u64,
    pub raised_sui_display: String,
    pub raised_sgusd_display: String,
    pub pending_proposals: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: String,
    pub campaigns: u64,
    pub raised_sui: u64,
    pub raised_sgusd: u64,
}

pub trait AnalyticsQueries {
    fn platform_stats(&self, now_ms: u64) -> Result<PlatformStats>;

    /// Per-category totals, largest SUI raised first.
    fn category_breakdown(&self) -> Result<Vec<CategoryStats>>;
}

impl AnalyticsQueries for Connection {
    fn platform_stats(&self, now_ms: u64) -> Result<PlatformStats> {
        let now = to_sql_amount(now_ms)?;
        let (total_campaigns, active_campaigns, funded_campaigns, raised_sui, raised_sgusd) =
            self.query_row(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(CASE WHEN is_active = 1 AND ended = 0
                                          AND (deadline_ms = 0 OR deadline_ms > ?1)
                                     THEN 1 ELSE 0 END), 0),
                       COALESCE(SUM(CASE WHEN goal_amount > 0 AND raised_sui >= goal_amount
                                     THEN 1 ELSE 0 END), 0),
                       COALESCE(SUM(raised_sui), 0),
                       COALESCE(SUM(raised_sgusd), 0)
                FROM campaigns
                "#,
                [now],
                |row| {
                    Ok((
                        get_u64(row, 0)?,
                        get_u64(row, 1)?,
                        get_u64(row, 2)?,
                        get_u64(row, 3)?,
                        get_u64(row, 4)?,
                    ))
                },
            )?;

        let (total_donations, unique_donors) = self.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT donor) FROM donations",
            [],
            |row| Ok((get_u64(row, 0)?, get_u64(row, 1)?)),
        )?;

        let pending_proposals = self.query_row(
            "SELECT COUNT(*) FROM proposals WHERE status = 'PENDING'",
            [],
            |row| get_u64(row, 0),
        )?;

        Ok(PlatformStats {
            total_campaigns,
            active_campaigns,
            funded_campaigns,
            total_donations,
            unique_donors,
            raised_sui,
            raised_sgusd,
            raised_sui_display: format_coin(raised_sui, CoinType::Sui),
            raised_sgusd_display: format_coin(raised_sgusd, CoinType::SgUsd),
            pending_proposals,
        })
    }

    fn category_breakdown(&self) -> Result<Vec<CategoryStats>> {
        let mut stmt = self.prepare(
            r#"
            SELECT category, COUNT(*), COALESCE(SUM(raised_sui), 0), COALESCE(SUM(raised_sgusd), 0)
            FROM campaigns
            GROUP BY category
            ORDER BY SUM(raised_sui) DESC, category
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CategoryStats {
                category: row.get(0)?,
                campaigns: get_u64(row, 1)?,
                raised_sui: get_u64(row, 2)?,
                raised_sgusd: get_u64(row, 3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
