//! # SuiGives Storage
//!
//! Mirror SQLite dari state chain, ditambah data off-chain (proposal dan
//! profil user).
//!
//! ## Modules
//!
//! | Module | Isi |
//! |--------|-----|
//! | `schema` | DDL dan key `storestate` |
//! | `migrations` | upgrade schema bertahap |
//! | `queries` | trait query per tabel, di-implement untuk `Connection` |
//! | `reconcile` | sinkronisasi chain → database |
//!
//! ## Invariant
//!
//! - Chain selalu menang: nilai campaign di database ditimpa saat rekonsiliasi
//! - Donasi unik per `tx_digest`; import ulang tidak mengubah apa pun
//! - Aggregate user selalu sama dengan hasil hitung ulang dari tabel donasi
//! - Lock koneksi tidak pernah ditahan melewati `.await`

use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use tracing::info;

pub mod error;
pub mod migrations;
pub mod queries;
pub mod reconcile;
pub mod schema;

pub use error::{DbError, Result};
pub use queries::{
    AnalyticsQueries, CampaignQueries, CategoryStats, DonationQueries, ImportOutcome,
    PlatformStats, ProposalQueries, StateQueries, UserQueries,
};
pub use reconcile::{ChainSource, ReconcileReport, Reconciler};

/// Shared handle to the SQLite mirror.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbError::Invalid(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::prepare(&conn)?;
        info!(path = %path.display(), "database opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::prepare(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run `f` with the connection locked.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Lock the connection directly. Do not hold the guard across `.await`.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory database");
    migrations::prepare(&conn).expect("schema");
    conn
}
