//! Storage errors.

use suigives_common::ProposalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    /// Stored data that cannot be mapped back to a domain value.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Proposal(#[from] ProposalError),

    #[error("invalid input: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Amounts are u64 on chain and INTEGER (i64) in SQLite.
pub(crate) fn to_sql_amount(v: u64) -> Result<i64> {
    i64::try_from(v).map_err(|_| DbError::Invalid(format!("amount {} exceeds storage range", v)))
}

pub(crate) fn from_sql_amount(v: i64) -> Result<u64> {
    u64::try_from(v).map_err(|_| DbError::Integrity(format!("negative amount {} in database", v)))
}
