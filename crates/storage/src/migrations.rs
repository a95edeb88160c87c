//! Database schema migrations.
//!
//! Fresh databases are created directly at [`CURRENT_VERSION`]. Older
//! databases are upgraded one version at a time, each step in its own
//! transaction together with the version bump.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{DbError, Result};
use crate::schema::{CREATE_SCHEMA, STATE_SCHEMA_VERSION};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 3;

struct Migration {
    from_version: i32,
    to_version: i32,
    upgrade_sql: &'static str,
    description: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        from_version: 1,
        to_version: 2,
        upgrade_sql: r#"
            CREATE TABLE IF NOT EXISTS proposals (
                id TEXT PRIMARY KEY,
                creator TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                image_url TEXT NOT NULL DEFAULT '',
                goal_amount INTEGER NOT NULL,
                deadline_ms INTEGER NOT NULL,
                category TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                campaign_id TEXT,
                admin_note TEXT,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS proposals_status ON proposals(status);
        "#,
        description: "Add proposals table for campaign review",
    },
    Migration {
        from_version: 2,
        to_version: 3,
        upgrade_sql: r#"
            ALTER TABLE users ADD COLUMN is_public INTEGER NOT NULL DEFAULT 1;
            ALTER TABLE users ADD COLUMN show_donations INTEGER NOT NULL DEFAULT 1;
        "#,
        description: "Add profile visibility flags",
    },
];

/// Schema version recorded in `storestate`; 1 when none is recorded.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: Option<String> = conn
        .query_row(
            "SELECT state FROM storestate WHERE statename = ?1",
            [STATE_SCHEMA_VERSION],
            |row| row.get(0),
        )
        .optional()?;

    match version {
        Some(v) => v
            .parse()
            .map_err(|_| DbError::Migration(format!("Invalid schema version: {}", v))),
        None => Ok(1),
    }
}

pub fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO storestate (statename, state) VALUES (?1, ?2)",
        params![STATE_SCHEMA_VERSION, version.to_string()],
    )?;
    Ok(())
}

/// True when the database has no `storestate` table yet.
pub fn is_fresh(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'storestate'",
        [],
        |row| row.get(0),
    )?;
    Ok(count == 0)
}

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_SCHEMA)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    info!("Initialized database with schema version {}", CURRENT_VERSION);
    Ok(())
}

/// Bring the database up to [`CURRENT_VERSION`].
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let mut current_version = get_schema_version(conn)?;

    if current_version == CURRENT_VERSION {
        return Ok(());
    }
    if current_version > CURRENT_VERSION {
        return Err(DbError::Migration(format!(
            "Database version {} is newer than supported version {}",
            current_version, CURRENT_VERSION
        )));
    }

    info!("Migrating database from version {} to {}", current_version, CURRENT_VERSION);

    while current_version < CURRENT_VERSION {
        let migration = MIGRATIONS
            .iter()
            .find(|m| m.from_version == current_version)
            .ok_or_else(|| {
                DbError::Migration(format!("No migration found from version {}", current_version))
            })?;

        info!(
            "Applying migration {} -> {}: {}",
            migration.from_version, migration.to_version, migration.description
        );

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.upgrade_sql)?;
        set_schema_version(&tx, migration.to_version)?;
        tx.commit()?;

        current_version = migration.to_version;
    }
    Ok(())
}

/// Create or upgrade the schema as needed.
pub fn prepare(conn: &Connection) -> Result<()> {
    if is_fresh(conn)? {
        initialize_schema(conn)
    } else {
        run_migrations(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Version 1 layout: no proposals table, no visibility flags.
    const V1_SCHEMA: &str = r#"
        CREATE TABLE storestate (statename TEXT PRIMARY KEY, state TEXT NOT NULL);
        CREATE TABLE campaigns (
            id TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT NOT NULL DEFAULT '',
            image_url TEXT NOT NULL DEFAULT '', goal_amount INTEGER NOT NULL,
            raised_sui INTEGER NOT NULL DEFAULT 0, raised_sgusd INTEGER NOT NULL DEFAULT 0,
            deadline_ms INTEGER NOT NULL, category TEXT NOT NULL DEFAULT '',
            creator TEXT NOT NULL, backer_count INTEGER NOT NULL DEFAULT 0,
            created_at_ms INTEGER NOT NULL, is_active INTEGER NOT NULL DEFAULT 1,
            ended INTEGER NOT NULL DEFAULT 0, synced_at_ms INTEGER NOT NULL
        );
        CREATE TABLE donations (
            tx_digest TEXT PRIMARY KEY, campaign_id TEXT NOT NULL, donor TEXT,
            amount INTEGER NOT NULL, coin_type TEXT NOT NULL, message TEXT NOT NULL DEFAULT '',
            is_anonymous INTEGER NOT NULL DEFAULT 0, timestamp_ms INTEGER NOT NULL
        );
        CREATE TABLE users (
            address TEXT PRIMARY KEY, total_donated_sui INTEGER NOT NULL DEFAULT 0,
            total_donated_sgusd INTEGER NOT NULL DEFAULT 0, donation_count INTEGER NOT NULL DEFAULT 0,
            first_donation_ms INTEGER, last_donation_ms INTEGER, display_name TEXT, bio TEXT,
            avatar_url TEXT, twitter TEXT, website TEXT,
            created_at_ms INTEGER NOT NULL, updated_at_ms INTEGER NOT NULL
        );
    "#;

    #[test]
    fn test_fresh_database_initialized_at_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(is_fresh(&conn).unwrap());
        prepare(&conn).unwrap();
        assert!(!is_fresh(&conn).unwrap());
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_upgrade_from_v1() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(V1_SCHEMA).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);

        prepare(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);

        conn.execute(
            "INSERT INTO users (address, created_at_ms, updated_at_ms) VALUES ('0x1', 0, 0)",
            [],
        )
        .unwrap();
        let is_public: i64 = conn
            .query_row("SELECT is_public FROM users WHERE address = '0x1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(is_public, 1);
        let proposals: i64 = conn.query_row("SELECT COUNT(*) FROM proposals", [], |r| r.get(0)).unwrap();
        assert_eq!(proposals, 0);
    }

    #[test]
    fn test_newer_version_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        prepare(&conn).unwrap();
        set_schema_version(&conn, CURRENT_VERSION + 1).unwrap();
        assert!(matches!(run_migrations(&conn), Err(DbError::Migration(_))));
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        prepare(&conn).unwrap();
        prepare(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }
}
