//! Database schema definitions.
//!
//! Amounts are stored as INTEGER in smallest units; chain values are u64 and
//! are range-checked on write. Timestamps are Unix milliseconds.

/// SQL to create the database schema at the current version.
pub const CREATE_SCHEMA: &str = r#"
-- Schema version and reconciliation cursor
CREATE TABLE IF NOT EXISTS storestate (
    statename TEXT PRIMARY KEY,
    state TEXT NOT NULL
);

-- Campaigns mirrored from chain; chain always overwrites
CREATE TABLE IF NOT EXISTS campaigns (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    image_url TEXT NOT NULL DEFAULT '',
    goal_amount INTEGER NOT NULL,
    raised_sui INTEGER NOT NULL DEFAULT 0,
    raised_sgusd INTEGER NOT NULL DEFAULT 0,
    deadline_ms INTEGER NOT NULL,
    category TEXT NOT NULL DEFAULT '',
    creator TEXT NOT NULL,
    backer_count INTEGER NOT NULL DEFAULT 0,
    created_at_ms INTEGER NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    ended INTEGER NOT NULL DEFAULT 0,
    synced_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS campaigns_category ON campaigns(category);

-- Donations, append-only, unique per transaction digest
CREATE TABLE IF NOT EXISTS donations (
    tx_digest TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    donor TEXT,
    amount INTEGER NOT NULL,
    coin_type TEXT NOT NULL,
    message TEXT NOT NULL DEFAULT '',
    is_anonymous INTEGER NOT NULL DEFAULT 0,
    timestamp_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS donations_campaign ON donations(campaign_id);
CREATE INDEX IF NOT EXISTS donations_donor ON donations(donor);

-- User profiles; aggregate columns are derived from donations
CREATE TABLE IF NOT EXISTS users (
    address TEXT PRIMARY KEY,
    total_donated_sui INTEGER NOT NULL DEFAULT 0,
    total_donated_sgusd INTEGER NOT NULL DEFAULT 0,
    donation_count INTEGER NOT NULL DEFAULT 0,
    first_donation_ms INTEGER,
    last_donation_ms INTEGER,
    display_name TEXT,
    bio TEXT,
    avatar_url TEXT,
    twitter TEXT,
    website TEXT,
    is_public INTEGER NOT NULL DEFAULT 1,
    show_donations INTEGER NOT NULL DEFAULT 1,
    created_at_ms INTEGER NOT NULL,
    updated_at_ms INTEGER NOT NULL
);

-- Campaign proposals under review
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
"#;

/// `storestate` key of the schema version.
pub const STATE_SCHEMA_VERSION: &str = "databaseschema";
/// `storestate` key of the last reconciled donation event cursor (JSON).
pub const STATE_DONATION_CURSOR: &str = "donationcursor";
/// `storestate` key of the last reconciliation time (Unix ms).
pub const STATE_LAST_RECONCILE: &str = "lastreconcile";
