use rusqlite::Connection;

use crate::error::StoreError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS documents (
    itinerary_id TEXT PRIMARY KEY,
    version INTEGER NOT NULL,
    owner_id TEXT NOT NULL,
    doc BLOB NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);

CREATE TABLE IF NOT EXISTS revisions (
    itinerary_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    revision_id TEXT NOT NULL UNIQUE,
    record BLOB NOT NULL,
    snapshot BLOB NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER)),
    PRIMARY KEY (itinerary_id, version)
);
CREATE INDEX IF NOT EXISTS idx_revisions_itinerary ON revisions (itinerary_id, version);
";
