//! User profile queries.
//!
//! Aggregate columns are never written from request input; they are always
//! recomputed from the `donations` table.

use rusqlite::{params, Connection, OptionalExtension, Row};
use suigives_common::{normalize_address, DonationAggregates, ProfileFields, UserProfile};

use super::{get_opt_u64, get_u64};
use crate::error::{to_sql_amount, DbError, Result};

const COLUMNS: &str = "address, total_donated_sui, total_donated_sgusd, donation_count, \
                       first_donation_ms, last_donation_ms, display_name, bio, avatar_url, \
                       twitter, website, is_public, show_donations, created_at_ms, updated_at_ms";

pub trait UserQueries {
    fn load_user(&self, address: &str) -> Result<Option<UserProfile>>;

    /// All users ordered by total SUI donated, largest first.
    fn list_users(&self) -> Result<Vec<UserProfile>>;

    /// Create or update the editable profile fields of an address.
    fn upsert_profile(&self, address: &str, fields: &ProfileFields, now_ms: u64) -> Result<UserProfile>;

    /// Recompute one donor's aggregates from donation records.
    fn recompute_user_aggregates(&self, address: &str) -> Result<DonationAggregates>;

    /// Recompute aggregates for every donor with at least one record.
    fn recompute_all_aggregates(&self) -> Result<usize>;
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        address: row.get(0)?,
        aggregates: DonationAggregates {
            total_donated_sui: get_u64(row, 1)?,
            total_donated_sgusd: get_u64(row, 2)?,
            donation_count: get_u64(row, 3)?,
            first_donation_ms: get_opt_u64(row, 4)?,
            last_donation_ms: get_opt_u64(row, 5)?,
        },
        profile: ProfileFields {
            display_name: row.get(6)?,
            bio: row.get(7)?,
            avatar_url: row.get(8)?,
            twitter: row.get(9)?,
            website: row.get(10)?,
            is_public: row.get(11)?,
            show_donations: row.get(12)?,
        },
        created_at_ms: get_u64(row, 13)?,
        updated_at_ms: get_u64(row, 14)?,
    })
}

fn valid_address(address: &str) -> Result<String> {
    normalize_address(address).ok_or_else(|| DbError::Invalid(format!("bad address: {}", address)))
}

/// Empty strings clear a field.
fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl UserQueries for Connection {
    fn load_user(&self, address: &str) -> Result<Option<UserProfile>> {
        let Some(address) = normalize_address(address) else {
            return Ok(None);
        };
        Ok(self
            .query_row(
                &format!("SELECT {} FROM users WHERE address = ?1", COLUMNS),
                [address],
                row_to_user,
            )
            .optional()?)
    }

    fn list_users(&self) -> Result<Vec<UserProfile>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY total_donated_sui DESC, address",
            COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_user)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn upsert_profile(&self, address: &str, f: &ProfileFields, now_ms: u64) -> Result<UserProfile> {
        let address = valid_address(address)?;
        let now = to_sql_amount(now_ms)?;
        self.execute(
            r#"
            INSERT INTO users (address, display_name, bio, avatar_url, twitter, website,
                               is_public, show_donations, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(address) DO UPDATE SET
                display_name = excluded.display_name,
                bio = excluded.bio,
                avatar_url = excluded.avatar_url,
                twitter = excluded.twitter,
                website = excluded.website,
                is_public = excluded.is_public,
                show_donations = excluded.show_donations,
                updated_at_ms = excluded.updated_at_ms
            "#,
            params![
                address,
                non_empty(&f.display_name),
                non_empty(&f.bio),
                non_empty(&f.avatar_url),
                non_empty(&f.twitter),
                non_empty(&f.website),
                f.is_public,
                f.show_donations,
                now,
            ],
        )?;
        self.load_user(&address)?
            .ok_or_else(|| DbError::NotFound(format!("user {}", address)))
    }

    fn recompute_user_aggregates(&self, address: &str) -> Result<DonationAggregates> {
        let address = valid_address(address)?;
        let aggregates = self.query_row(
            r#"
            SELECT COALESCE(SUM(CASE WHEN coin_type = 'SUI' THEN amount ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN coin_type = 'SGUSD' THEN amount ELSE 0 END), 0),
                   COUNT(*),
                   MIN(timestamp_ms),
                   MAX(timestamp_ms)
            FROM donations WHERE donor = ?1
            "#,
            [&address],
            |row| {
                Ok(DonationAggregates {
                    total_donated_sui: get_u64(row, 0)?,
                    total_donated_sgusd: get_u64(row, 1)?,
                    donation_count: get_u64(row, 2)?,
                    first_donation_ms: get_opt_u64(row, 3)?,
                    last_donation_ms: get_opt_u64(row, 4)?,
                })
            },
        )?;

        let now = to_sql_amount(suigives_common::current_timestamp_ms())?;
        self.execute(
            r#"
            INSERT INTO users (address, total_donated_sui, total_donated_sgusd, donation_count,
                               first_donation_ms, last_donation_ms, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(address) DO UPDATE SET
                total_donated_sui = excluded.total_donated_sui,
                total_donated_sgusd = excluded.total_donated_sgusd,
                donation_count = excluded.donation_count,
                first_donation_ms = excluded.first_donation_ms,
                last_donation_ms = excluded.last_donation_ms,
                updated_at_ms = excluded.updated_at_ms
            "#,
            params![
                address,
                to_sql_amount(aggregates.total_donated_sui)?,
                to_sql_amount(aggregates.total_donated_sgusd)?,
                to_sql_amount(aggregates.donation_count)?,
                aggregates.first_donation_ms.map(to_sql_amount).transpose()?,
                aggregates.last_donation_ms.map(to_sql_amount).transpose()?,
                now,
            ],
        )?;
        Ok(aggregates)
    }

    fn recompute_all_aggregates(&self) -> Result<usize> {
        let donors: Vec<String> = {
            let mut stmt =
                self.prepare("SELECT DISTINCT donor FROM donations WHERE donor IS NOT NULL")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let tx = self.unchecked_transaction()?;
        for donor in &donors {
            tx.recompute_user_aggregates(donor)?;
        }
        tx.commit()?;
        Ok(donors.len())
    }
}
