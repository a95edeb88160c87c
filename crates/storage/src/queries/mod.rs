//! Query traits implemented for [`rusqlite::Connection`].

pub mod analytics;
pub mod campaigns;
pub mod donations;
pub mod proposals;
pub mod state;
pub mod users;

pub use analytics::{AnalyticsQueries, CategoryStats, PlatformStats};
pub use campaigns::CampaignQueries;
pub use donations::{DonationQueries, ImportOutcome};
pub use proposals::ProposalQueries;
pub use state::StateQueries;
pub use users::UserQueries;

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;

/// Read a non-negative INTEGER column as u64.
pub(crate) fn get_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let v: i64 = row.get(idx)?;
    u64::try_from(v).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

pub(crate) fn get_opt_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    let v: Option<i64> = row.get(idx)?;
    v.map(|v| {
        u64::try_from(v)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
    })
    .transpose()
}

/// Read a TEXT column through `FromStr`.
pub(crate) fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
